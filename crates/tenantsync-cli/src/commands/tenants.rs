use tenantsync_core::config::SyncSettings;
use tenantsync_core::db::TenantRegistry;

use crate::commands::common::parse_tenant;
use crate::error::CliError;

pub fn run_tenants(settings: &SyncSettings, as_json: bool) -> Result<(), CliError> {
    let registry = TenantRegistry::new(settings.storage_root());
    let tenants = registry.list_tenants()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&tenants)?);
    } else if tenants.is_empty() {
        println!("No tenants under {}", settings.data_dir.display());
    } else {
        for tenant in tenants {
            println!("{tenant}");
        }
    }
    Ok(())
}

pub async fn run_delete_tenant(settings: &SyncSettings, tenant: &str) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let registry = TenantRegistry::new(settings.storage_root());

    if registry.delete_tenant(&tenant).await? {
        println!("Deleted tenant {tenant}");
    } else {
        println!("No local database for tenant {tenant}");
    }
    Ok(())
}
