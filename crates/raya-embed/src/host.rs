//! Host loader capability surface
//!
//! The resolution engine never talks to a concrete loader. It needs four
//! primitives, captured by [`HostLoader`]: subscribe to failed resolutions,
//! enumerate loaded modules, load a module from bytes, and parse an identity.
//!
//! [`ModuleHost`] is the in-process loader shipped with this crate. It keeps
//! loaded modules in load order, deduplicates by identity, and fires its
//! failed-resolution listeners in subscription order when a requested module
//! is not resident.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use raya_image::{ModuleDescriptor, ModuleIdentity, Target};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use crate::error::{HostError, LoadError};

/// Handle returned by [`HostLoader::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A request the host loader could not satisfy on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    name: String,
}

impl ResolveRequest {
    /// Create a request for the module named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Requested module name, as given to the host
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Failed-resolution listener
///
/// Receives the host that raised the notification and the request. Returns
/// the module that satisfies it, `None` to let later listeners try, or an
/// error that aborts the whole resolution.
pub type ResolveListener = Arc<
    dyn Fn(&dyn HostLoader, &ResolveRequest) -> Result<Option<Arc<LoadedModule>>, HostError>
        + Send
        + Sync,
>;

/// Wrap a closure as a [`ResolveListener`]
pub fn listener<F>(f: F) -> ResolveListener
where
    F: Fn(&dyn HostLoader, &ResolveRequest) -> Result<Option<Arc<LoadedModule>>, HostError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Capabilities the resolution engine needs from a host loader
pub trait HostLoader: Send + Sync {
    /// Append a listener to the failed-resolution notification
    fn subscribe(&self, listener: ResolveListener) -> Result<ListenerId, HostError>;

    /// Modules currently resident, in load order
    fn loaded_modules(&self) -> Result<Vec<Arc<LoadedModule>>, HostError>;

    /// Load a module image; fails on malformed or incompatible input
    fn load_from_bytes(&self, bytes: &[u8]) -> Result<Arc<LoadedModule>, HostError>;

    /// Parse a requested name into a canonical identity
    fn parse_identity(&self, name: &str) -> Result<ModuleIdentity, HostError>;
}

/// A module resident in a host loader
#[derive(Debug)]
pub struct LoadedModule {
    identity: ModuleIdentity,
    image: Vec<u8>,
    checksum: [u8; 32],
}

impl LoadedModule {
    /// Module identity
    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    /// Image bytes the module was loaded from
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// SHA-256 of the image
    pub fn checksum(&self) -> &[u8; 32] {
        &self.checksum
    }

    /// SHA-256 of the image as lowercase hex
    pub fn checksum_hex(&self) -> String {
        hex::encode(self.checksum)
    }
}

#[derive(Default)]
struct LoadedSet {
    /// Load order
    order: Vec<Arc<LoadedModule>>,
    /// Index by full name
    by_name: FxHashMap<String, Arc<LoadedModule>>,
}

/// In-process host loader
pub struct ModuleHost {
    target: Target,
    loaded: RwLock<LoadedSet>,
    listeners: RwLock<Vec<(ListenerId, ResolveListener)>>,
    next_listener: AtomicU64,
}

static GLOBAL_HOST: LazyLock<ModuleHost> = LazyLock::new(|| ModuleHost::new(Target::current()));

impl ModuleHost {
    /// Create an empty host loading images for `target`
    pub fn new(target: Target) -> Self {
        Self {
            target,
            loaded: RwLock::new(LoadedSet::default()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// The process-wide host
    pub fn global() -> &'static ModuleHost {
        &GLOBAL_HOST
    }

    /// Target this host loads images for
    pub fn target(&self) -> Target {
        self.target
    }

    /// Load a module image
    ///
    /// Loading an identity that is already resident returns the resident
    /// module; the first load wins.
    pub fn load(&self, bytes: &[u8]) -> Result<Arc<LoadedModule>, LoadError> {
        let descriptor = ModuleDescriptor::read(bytes)?;
        let identity = descriptor.identity();

        if !descriptor.target().runs_on(self.target) {
            return Err(LoadError::IncompatibleTarget {
                identity: identity.full_name().to_string(),
                image: descriptor.target(),
                host: self.target,
            });
        }

        let checksum: [u8; 32] = Sha256::digest(bytes).into();

        let mut loaded = self.loaded.write();
        if let Some(existing) = loaded.by_name.get(identity.full_name()) {
            if existing.checksum != checksum {
                warn!(
                    identity = %identity,
                    resident = %existing.checksum_hex(),
                    "ignoring different image for an already loaded module"
                );
            }
            return Ok(existing.clone());
        }

        let module = Arc::new(LoadedModule {
            identity: identity.clone(),
            image: bytes.to_vec(),
            checksum,
        });
        loaded
            .by_name
            .insert(identity.full_name().to_string(), module.clone());
        loaded.order.push(module.clone());
        debug!(identity = %identity, size = bytes.len(), "loaded module");

        Ok(module)
    }

    /// Resolve a module by name
    ///
    /// Returns the resident module when there is one; otherwise raises the
    /// failed-resolution notification. Listeners run in subscription order
    /// and the first one to produce a module wins.
    pub fn resolve(&self, name: &str) -> Result<Arc<LoadedModule>, HostError> {
        let identity: ModuleIdentity = name.parse()?;
        if let Some(module) = self.find_loaded(&identity) {
            return Ok(module);
        }

        // Snapshot so listeners can load modules or subscribe without
        // contending with this call.
        let listeners: Vec<ResolveListener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        trace!(identity = %identity, listeners = listeners.len(), "raising failed resolution");

        let request = ResolveRequest::new(name);
        let host: &dyn HostLoader = self;
        for listener in listeners {
            if let Some(module) = listener(host, &request)? {
                return Ok(module);
            }
        }

        Err(LoadError::NotFound(identity.full_name().to_string()).into())
    }

    /// Resident module with exactly this identity
    pub fn find_loaded(&self, identity: &ModuleIdentity) -> Option<Arc<LoadedModule>> {
        self.loaded.read().by_name.get(identity.full_name()).cloned()
    }

    /// Whether a module with exactly this identity is resident
    pub fn is_loaded(&self, identity: &ModuleIdentity) -> bool {
        self.loaded.read().by_name.contains_key(identity.full_name())
    }

    /// Resident modules in load order
    pub fn modules(&self) -> Vec<Arc<LoadedModule>> {
        self.loaded.read().order.clone()
    }

    /// Number of resident modules
    pub fn module_count(&self) -> usize {
        self.loaded.read().order.len()
    }

    /// Remove a failed-resolution listener; returns whether it was present
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Number of failed-resolution listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl HostLoader for ModuleHost {
    fn subscribe(&self, listener: ResolveListener) -> Result<ListenerId, HostError> {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        Ok(id)
    }

    fn loaded_modules(&self) -> Result<Vec<Arc<LoadedModule>>, HostError> {
        Ok(self.modules())
    }

    fn load_from_bytes(&self, bytes: &[u8]) -> Result<Arc<LoadedModule>, HostError> {
        Ok(self.load(bytes)?)
    }

    fn parse_identity(&self, name: &str) -> Result<ModuleIdentity, HostError> {
        Ok(name.parse()?)
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost")
            .field("target", &self.target)
            .field("modules", &self.module_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raya_image::ModuleImage;

    fn image(text: &str) -> Vec<u8> {
        ModuleImage::new(text.parse().unwrap()).encode()
    }

    #[test]
    fn test_load_keeps_order() {
        let host = ModuleHost::new(Target::X86_64);
        host.load(&image("b, Version=1.0.0")).unwrap();
        host.load(&image("a, Version=1.0.0")).unwrap();

        let names: Vec<String> = host
            .modules()
            .iter()
            .map(|m| m.identity().name().to_string())
            .collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_duplicate_load_returns_resident() {
        let host = ModuleHost::new(Target::X86_64);
        let first = host.load(&image("a, Version=1.0.0")).unwrap();
        let second = host
            .load(
                &ModuleImage::new("a, Version=1.0.0".parse().unwrap())
                    .with_code(vec![1])
                    .encode(),
            )
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.module_count(), 1);
    }

    #[test]
    fn test_rejects_incompatible_target() {
        let host = ModuleHost::new(Target::X86_64);
        let bytes = ModuleImage::new("arm.only, Version=1.0.0".parse().unwrap())
            .with_target(Target::Aarch64)
            .encode();

        assert!(matches!(
            host.load(&bytes),
            Err(LoadError::IncompatibleTarget { image: Target::Aarch64, .. })
        ));
        assert_eq!(host.module_count(), 0);
    }

    #[test]
    fn test_rejects_non_module() {
        let host = ModuleHost::new(Target::Any);
        assert!(matches!(host.load(b"hello"), Err(LoadError::BadImage(_))));
    }

    #[test]
    fn test_resolve_prefers_resident_module() {
        let host = ModuleHost::new(Target::Any);
        let loaded = host.load(&image("a, Version=1.0.0")).unwrap();
        host.subscribe(listener(|_, _| panic!("listener must not run")))
            .unwrap();

        let resolved = host.resolve("a, Version=1.0.0").unwrap();
        assert!(Arc::ptr_eq(&loaded, &resolved));
    }

    #[test]
    fn test_resolve_without_listeners_fails() {
        let host = ModuleHost::new(Target::Any);
        assert!(matches!(
            host.resolve("missing, Version=1.0.0"),
            Err(HostError::Load(LoadError::NotFound(_)))
        ));
        assert!(matches!(
            host.resolve("not an identity"),
            Err(HostError::Identity(_))
        ));
    }

    #[test]
    fn test_listeners_run_in_order_until_one_resolves() {
        let host = ModuleHost::new(Target::Any);
        let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let log = calls.clone();
        host.subscribe(listener(move |_, request| {
            log.lock().push(format!("first:{}", request.name()));
            Ok(None)
        }))
        .unwrap();

        let log = calls.clone();
        host.subscribe(listener(move |host, _| {
            log.lock().push("second".to_string());
            host.load_from_bytes(&image("late, Version=1.0.0")).map(Some)
        }))
        .unwrap();

        let log = calls.clone();
        host.subscribe(listener(move |_, _| {
            log.lock().push("third".to_string());
            Ok(None)
        }))
        .unwrap();

        let module = host.resolve("late, Version=1.0.0").unwrap();
        assert_eq!(module.identity().name(), "late");
        assert_eq!(
            *calls.lock(),
            ["first:late, Version=1.0.0".to_string(), "second".to_string()]
        );
        assert!(host.is_loaded(module.identity()));
    }

    #[test]
    fn test_unsubscribe() {
        let host = ModuleHost::new(Target::Any);
        let id = host.subscribe(listener(|_, _| Ok(None))).unwrap();
        assert_eq!(host.listener_count(), 1);
        assert!(host.unsubscribe(id));
        assert!(!host.unsubscribe(id));
        assert_eq!(host.listener_count(), 0);
    }
}
