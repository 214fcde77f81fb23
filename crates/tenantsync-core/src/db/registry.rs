//! Tenant storage registry
//!
//! Owns the single open tenant database. Opening another tenant always closes
//! the current one first, so two tenants' connections never coexist.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::TenantId;

use super::Database;

const TENANTS_DIR: &str = "tenants";
const DB_EXTENSION: &str = "db";

/// Where tenant databases live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRoot {
    /// One `<root>/tenants/<tenant>.db` file per tenant
    Directory(PathBuf),
    /// Fresh in-memory database per open (primarily for tests)
    InMemory,
}

impl StorageRoot {
    fn tenant_path(&self, tenant: &TenantId) -> Option<PathBuf> {
        match self {
            Self::Directory(root) => Some(
                root.join(TENANTS_DIR)
                    .join(format!("{}.{DB_EXTENSION}", tenant.as_str())),
            ),
            Self::InMemory => None,
        }
    }
}

/// Descriptor of the open tenant database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantHandle {
    pub tenant_id: TenantId,
    pub schema_version: i32,
    pub path: Option<PathBuf>,
}

struct ActiveTenant {
    handle: TenantHandle,
    db: Database,
}

/// Thread-safe owner of at most one open tenant database.
#[derive(Clone)]
pub struct TenantRegistry {
    root: StorageRoot,
    active: Arc<Mutex<Option<ActiveTenant>>>,
}

impl TenantRegistry {
    pub fn new(root: StorageRoot) -> Self {
        Self {
            root,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Registry whose tenants live in memory only.
    pub fn in_memory() -> Self {
        Self::new(StorageRoot::InMemory)
    }

    pub const fn root(&self) -> &StorageRoot {
        &self.root
    }

    /// Open `tenant`, closing any other open tenant first.
    ///
    /// Re-opening the already open tenant returns its handle unchanged. On
    /// failure no tenant is left open.
    pub async fn open(&self, tenant: &TenantId) -> Result<TenantHandle> {
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref() {
            if &current.handle.tenant_id == tenant {
                return Ok(current.handle.clone());
            }
        }

        if let Some(previous) = active.take() {
            Self::close_active(previous);
        }

        let opened = self.open_database(tenant)?;
        let handle = opened.handle.clone();
        tracing::info!(
            "Opened tenant {} at schema version {}",
            handle.tenant_id,
            handle.schema_version
        );
        *active = Some(opened);
        Ok(handle)
    }

    /// Close the open tenant, returning which tenant was closed.
    pub async fn close(&self) -> Option<TenantId> {
        let previous = self.active.lock().await.take()?;
        let tenant_id = previous.handle.tenant_id.clone();
        Self::close_active(previous);
        Some(tenant_id)
    }

    /// Handle of the open tenant, if any
    pub async fn current(&self) -> Option<TenantHandle> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.handle.clone())
    }

    /// Id of the open tenant, if any
    pub async fn current_tenant(&self) -> Option<TenantId> {
        self.current().await.map(|handle| handle.tenant_id)
    }

    /// Whether `tenant` is the open tenant
    pub async fn is_open(&self, tenant: &TenantId) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| &active.handle.tenant_id == tenant)
    }

    /// Run `f` against `tenant`'s database on the blocking pool.
    ///
    /// Fails with `StorageUnavailable` unless `tenant` is the open tenant. The
    /// registry stays locked until `f` returns.
    pub async fn with_tenant<T, F>(&self, tenant: &TenantId, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        let mut active = Arc::clone(&self.active).lock_owned().await;
        if !active
            .as_ref()
            .is_some_and(|current| &current.handle.tenant_id == tenant)
        {
            return Err(Error::StorageUnavailable(Some(tenant.to_string())));
        }

        run_blocking(move || match active.as_mut() {
            Some(current) => f(&mut current.db),
            None => Err(Error::StorageUnavailable(None)),
        })
        .await
    }

    /// Run `f` against whichever tenant is open, on the blocking pool.
    pub async fn with_active<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&TenantId, &mut Database) -> Result<T> + Send + 'static,
    {
        let mut active = Arc::clone(&self.active).lock_owned().await;
        if active.is_none() {
            return Err(Error::StorageUnavailable(None));
        }

        run_blocking(move || match active.as_mut() {
            Some(current) => f(&current.handle.tenant_id, &mut current.db),
            None => Err(Error::StorageUnavailable(None)),
        })
        .await
    }

    /// Physically delete a tenant's database files.
    ///
    /// The open tenant cannot be deleted; close it first. Returns whether a
    /// database file existed.
    pub async fn delete_tenant(&self, tenant: &TenantId) -> Result<bool> {
        let active = self.active.lock().await;
        if active
            .as_ref()
            .is_some_and(|current| &current.handle.tenant_id == tenant)
        {
            return Err(Error::InvalidInput(format!(
                "tenant {tenant} is open; close it before deleting"
            )));
        }

        let Some(path) = self.root.tenant_path(tenant) else {
            return Ok(false);
        };

        let existed = path.exists();
        if existed {
            std::fs::remove_file(&path)?;
        }
        remove_sidecar_files(&path)?;
        if existed {
            tracing::warn!("Deleted local database for tenant {}", tenant);
        }
        Ok(existed)
    }

    /// Tenants that have a database under this registry's root
    pub fn list_tenants(&self) -> Result<Vec<TenantId>> {
        let StorageRoot::Directory(root) = &self.root else {
            return Ok(Vec::new());
        };

        let dir = root.join(TENANTS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut tenants = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DB_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match TenantId::new(stem) {
                Ok(tenant) => tenants.push(tenant),
                Err(error) => {
                    tracing::warn!("Ignoring unexpected file {}: {}", path.display(), error);
                }
            }
        }
        tenants.sort();
        Ok(tenants)
    }

    fn open_database(&self, tenant: &TenantId) -> Result<ActiveTenant> {
        let path = self.root.tenant_path(tenant);
        let db = match &path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Database::open(path)?
            }
            None => Database::open_in_memory()?,
        };

        claim_tenant(&db, tenant)?;

        Ok(ActiveTenant {
            handle: TenantHandle {
                tenant_id: tenant.clone(),
                schema_version: db.schema_version(),
                path,
            },
            db,
        })
    }

    fn close_active(previous: ActiveTenant) {
        let tenant_id = previous.handle.tenant_id;
        match previous.db.close() {
            Ok(()) => tracing::info!("Closed tenant {}", tenant_id),
            Err(error) => {
                tracing::warn!("Error while closing tenant {}: {}", tenant_id, error);
            }
        }
    }
}

/// Run synchronous `SQLite` work off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Record the owning tenant in a new database, or check it on an existing one.
fn claim_tenant(db: &Database, tenant: &TenantId) -> Result<()> {
    let conn = db.connection();
    let owner: Option<String> = conn
        .query_row(
            "SELECT value FROM tenant_meta WHERE key = 'tenant_id'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match owner {
        Some(owner) if owner == tenant.as_str() => Ok(()),
        Some(owner) => Err(Error::InvalidInput(format!(
            "database belongs to tenant {owner}, not {tenant}"
        ))),
        None => {
            conn.execute(
                "INSERT INTO tenant_meta (key, value) VALUES ('tenant_id', ?), ('created_at', ?)",
                params![tenant.as_str(), crate::util::now_millis().to_string()],
            )?;
            Ok(())
        }
    }
}

/// Remove `-wal`, `-shm` and other `SQLite` sidecars next to `db_path`.
fn remove_sidecar_files(db_path: &Path) -> Result<()> {
    let Some(parent) = db_path.parent() else {
        return Ok(());
    };
    let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
        return Ok(());
    };
    if !parent.exists() {
        return Ok(());
    }
    let sidecar_prefix = format!("{base_name}-");

    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with(&sidecar_prefix) {
            std::fs::remove_file(entry.path())?;
        }
    }

    Ok(())
}
