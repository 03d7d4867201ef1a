//! Type registry
//!
//! Descriptors refer to components, systems and prefabs by name. A
//! [`Registry`] maps those names to factories and is passed explicitly to
//! every descriptor expansion, so registration order is visible at the call
//! site instead of depending on module load order.
//!
//! Properties are assigned the way a shallow object merge would: the
//! default value of the type is serialized, each key of the props overwrites
//! the matching field (last write wins), and the result is deserialized
//! back. Unknown keys are ignored.

use std::any::{TypeId, type_name};
use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::{EcsError, EntityDescriptor, Props, RegistryKind, Result};
use crate::ecs::{Component, ComponentHandle, Prefab, System, SystemHandle};
use crate::input::InputManager;
use crate::prefabs::OriginGraph;
use crate::renderer::Renderer;

/// Last path segment of a type name, generics stripped:
/// `grove::ecs::Transform` becomes `Transform`.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Construct `T` from its default value with `props` assigned on top.
///
/// # Errors
///
/// [`EcsError::InvalidProperties`] when a property has the wrong shape for
/// its field.
pub fn instantiate<T>(name: &str, props: &Props) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let invalid = |source: serde_json::Error| EcsError::InvalidProperties {
        name: name.to_owned(),
        source,
    };
    if props.is_empty() {
        return Ok(T::default());
    }

    let mut value = serde_json::to_value(T::default()).map_err(invalid)?;
    match value.as_object_mut() {
        Some(fields) => {
            for (key, prop) in props {
                fields.insert(key.clone(), prop.clone());
            }
        }
        None => log::warn!("`{name}` does not serialize to an object, ignoring props"),
    }
    serde_json::from_value(value).map_err(invalid)
}

type ComponentFactory = Box<dyn Fn(&Props) -> Result<ComponentHandle>>;
type SystemFactory = Box<dyn Fn(&Props) -> Result<SystemHandle>>;
type PrefabFactory = Box<dyn Fn(&Props) -> Result<EntityDescriptor>>;

/// Name to factory table for one kind of registrable type.
struct TypeTable<F> {
    kind: RegistryKind,
    by_name: FxHashMap<String, F>,
    by_type: FxHashMap<TypeId, String>,
}

impl<F> TypeTable<F> {
    fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            by_name: FxHashMap::default(),
            by_type: FxHashMap::default(),
        }
    }

    fn insert(&mut self, name: String, type_id: Option<TypeId>, factory: F) -> Result<()> {
        if self.by_name.contains_key(&name) {
            return Err(EcsError::DuplicateRegistration {
                kind: self.kind,
                name,
            });
        }
        log::debug!("registered {} type `{name}`", self.kind);
        if let Some(type_id) = type_id {
            self.by_type.entry(type_id).or_insert_with(|| name.clone());
        }
        self.by_name.insert(name, factory);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<&F> {
        self.by_name.get(name).ok_or_else(|| EcsError::UnknownType {
            kind: self.kind,
            name: name.to_owned(),
        })
    }

    fn name_of(&self, type_id: TypeId) -> Option<&str> {
        self.by_type.get(&type_id).map(String::as_str)
    }

    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Registry of component, system and prefab types.
pub struct Registry {
    components: TypeTable<ComponentFactory>,
    systems: TypeTable<SystemFactory>,
    prefabs: TypeTable<PrefabFactory>,
}

impl Registry {
    /// An empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            components: TypeTable::new(RegistryKind::Component),
            systems: TypeTable::new(RegistryKind::System),
            prefabs: TypeTable::new(RegistryKind::Prefab),
        }
    }

    /// A registry with the built-in components, systems and prefabs.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        use crate::ecs::{ComponentManager, Shape, Transform};

        // names are unique on a fresh registry
        let results = [
            self.register_component::<Transform>(),
            self.register_component::<Shape>(),
            self.register_system::<ComponentManager>(),
            self.register_system::<Renderer>(),
            self.register_system::<InputManager>(),
            self.register_prefab::<OriginGraph>(),
        ];
        for err in results.into_iter().filter_map(|result| result.err()) {
            log::error!("failed to register built-in type: {err}");
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Register `T` under its short type name.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_component<T>(&mut self) -> Result<()>
    where
        T: Component + Default + Serialize + DeserializeOwned,
    {
        self.register_component_as::<T>(short_type_name::<T>())
    }

    /// Register `T` under an explicit name.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_component_as<T>(&mut self, name: impl Into<String>) -> Result<()>
    where
        T: Component + Default + Serialize + DeserializeOwned,
    {
        let name = name.into();
        let type_name = name.clone();
        self.components.insert(
            name,
            Some(TypeId::of::<T>()),
            Box::new(move |props: &Props| {
                Ok(ComponentHandle::new(instantiate::<T>(&type_name, props)?))
            }),
        )
    }

    /// Register a custom factory.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_component_with(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Props) -> Result<ComponentHandle> + 'static,
    ) -> Result<()> {
        self.components.insert(name.into(), None, Box::new(factory))
    }

    /// Construct a registered component.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownType`] or [`EcsError::InvalidProperties`].
    pub fn create_component(&self, name: &str, props: &Props) -> Result<ComponentHandle> {
        (self.components.resolve(name)?)(props)
    }

    /// Name `T` was registered under.
    #[must_use]
    pub fn component_name<T: Component>(&self) -> Option<&str> {
        self.components.name_of(TypeId::of::<T>())
    }

    #[must_use]
    pub fn component_names(&self) -> Vec<&str> {
        self.components.names()
    }

    // ========================================================================
    // Systems
    // ========================================================================

    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_system<T>(&mut self) -> Result<()>
    where
        T: System + Default + Serialize + DeserializeOwned,
    {
        self.register_system_as::<T>(short_type_name::<T>())
    }

    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_system_as<T>(&mut self, name: impl Into<String>) -> Result<()>
    where
        T: System + Default + Serialize + DeserializeOwned,
    {
        let name = name.into();
        let type_name = name.clone();
        self.systems.insert(
            name,
            Some(TypeId::of::<T>()),
            Box::new(move |props: &Props| {
                Ok(SystemHandle::new(instantiate::<T>(&type_name, props)?))
            }),
        )
    }

    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_system_with(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Props) -> Result<SystemHandle> + 'static,
    ) -> Result<()> {
        self.systems.insert(name.into(), None, Box::new(factory))
    }

    /// # Errors
    ///
    /// [`EcsError::UnknownType`] or [`EcsError::InvalidProperties`].
    pub fn create_system(&self, name: &str, props: &Props) -> Result<SystemHandle> {
        (self.systems.resolve(name)?)(props)
    }

    #[must_use]
    pub fn system_name<T: System>(&self) -> Option<&str> {
        self.systems.name_of(TypeId::of::<T>())
    }

    #[must_use]
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.names()
    }

    // ========================================================================
    // Prefabs
    // ========================================================================

    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_prefab<T: Prefab + Default + 'static>(&mut self) -> Result<()> {
        self.register_prefab_as(short_type_name::<T>(), T::default())
    }

    /// Register a prefab instance under a name.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_prefab_as<T: Prefab + 'static>(
        &mut self,
        name: impl Into<String>,
        prefab: T,
    ) -> Result<()> {
        let name = name.into();
        let prefab_name = name.clone();
        self.prefabs.insert(
            name,
            Some(TypeId::of::<T>()),
            Box::new(move |props: &Props| prefab.describe(&prefab_name, props)),
        )
    }

    /// # Errors
    ///
    /// [`EcsError::DuplicateRegistration`] if the name is taken.
    pub fn register_prefab_with(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Props) -> Result<EntityDescriptor> + 'static,
    ) -> Result<()> {
        self.prefabs.insert(name.into(), None, Box::new(factory))
    }

    /// Expand a registered prefab into its descriptor, overrides applied.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownType`] or [`EcsError::InvalidProperties`].
    pub fn describe_prefab(&self, name: &str, props: &Props) -> Result<EntityDescriptor> {
        (self.prefabs.resolve(name)?)(props)
    }

    #[must_use]
    pub fn prefab_name<T: Prefab + 'static>(&self) -> Option<&str> {
        self.prefabs.name_of(TypeId::of::<T>())
    }

    #[must_use]
    pub fn prefab_names(&self) -> Vec<&str> {
        self.prefabs.names()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("components", &self.component_names())
            .field("systems", &self.system_names())
            .field("prefabs", &self.prefab_names())
            .finish()
    }
}
