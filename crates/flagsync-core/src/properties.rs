//! Typed property value model
//!
//! Custom and device properties supply named, typed values to the request
//! pipeline and (out of scope here) the targeting engine. A property value
//! is either fixed at construction or computed on demand from an optional
//! request context; resolution never mutates the context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Prefix applied to device property names, once, at construction time
pub const DEVICE_PROPERTY_PREFIX: &str = "rox.";

/// Declared type of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// UTF-8 string
    String,
    /// Signed integer
    Int,
    /// Floating point number
    Float,
    /// Boolean
    Bool,
    /// Semantic version string
    Semver,
}

/// A typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// UTF-8 string
    String(String),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Semantic version string
    Semver(String),
}

impl PropertyValue {
    /// The declared type this value satisfies
    #[inline]
    #[must_use]
    pub fn type_of(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Int(_) => PropertyType::Int,
            Self::Float(_) => PropertyType::Float,
            Self::Bool(_) => PropertyType::Bool,
            Self::Semver(_) => PropertyType::Semver,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(v) | Self::Semver(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Optional request context handed to computed property resolvers
pub type PropertyContext = HashMap<String, PropertyValue>;

/// Resolver function type for computed properties
pub type PropertyResolverFn =
    dyn Fn(Option<&PropertyContext>) -> PropertyValue + Send + Sync + 'static;

/// Either a fixed value or a pure function of the request context
#[derive(Clone)]
enum Resolver {
    Fixed(PropertyValue),
    Computed(Arc<PropertyResolverFn>),
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            Self::Computed(_) => f.debug_tuple("Computed").field(&"<fn>").finish(),
        }
    }
}

/// A named, typed property
///
/// Type correctness of computed resolvers is the resolver author's
/// responsibility; fixed values are checked against the declared type at
/// construction in debug builds.
#[derive(Debug, Clone)]
pub struct CustomProperty {
    name: String,
    property_type: PropertyType,
    resolver: Resolver,
}

impl CustomProperty {
    /// Create a property with a fixed value
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        property_type: PropertyType,
        value: impl Into<PropertyValue>,
    ) -> Self {
        let value = value.into();
        debug_assert_eq!(
            value.type_of(),
            property_type,
            "fixed property value does not match its declared type"
        );
        Self {
            name: name.into(),
            property_type,
            resolver: Resolver::Fixed(value),
        }
    }

    /// Create a property computed from the optional request context
    #[must_use]
    pub fn computed<F>(name: impl Into<String>, property_type: PropertyType, resolver: F) -> Self
    where
        F: Fn(Option<&PropertyContext>) -> PropertyValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            property_type,
            resolver: Resolver::Computed(Arc::new(resolver)),
        }
    }

    /// Property name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type
    #[inline]
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Resolve the property value
    ///
    /// Fixed values ignore `context`; computed values receive it as-is. No
    /// implicit coercion is performed on the resolver's return value.
    #[must_use]
    pub fn value(&self, context: Option<&PropertyContext>) -> PropertyValue {
        match &self.resolver {
            Resolver::Fixed(value) => value.clone(),
            Resolver::Computed(resolver) => resolver(context),
        }
    }
}

/// A [`CustomProperty`] namespaced under [`DEVICE_PROPERTY_PREFIX`]
///
/// The prefix is applied exactly once, when the property is constructed.
#[derive(Debug, Clone)]
pub struct DeviceProperty {
    inner: CustomProperty,
}

impl DeviceProperty {
    /// Create a device property with a fixed value
    #[must_use]
    pub fn new(
        name: impl AsRef<str>,
        property_type: PropertyType,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            inner: CustomProperty::new(Self::namespaced(name.as_ref()), property_type, value),
        }
    }

    /// Create a device property computed from the optional request context
    #[must_use]
    pub fn computed<F>(name: impl AsRef<str>, property_type: PropertyType, resolver: F) -> Self
    where
        F: Fn(Option<&PropertyContext>) -> PropertyValue + Send + Sync + 'static,
    {
        Self {
            inner: CustomProperty::computed(Self::namespaced(name.as_ref()), property_type, resolver),
        }
    }

    fn namespaced(name: &str) -> String {
        format!("{DEVICE_PROPERTY_PREFIX}{name}")
    }
}

impl std::ops::Deref for DeviceProperty {
    type Target = CustomProperty;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Supplier of fully resolved request properties
///
/// Called once per fetch attempt; returned values need no further context
/// since they are embedded directly into outbound request parameters.
pub trait PropertySource: Send + Sync + fmt::Debug {
    /// All resolved properties as string key-value pairs
    fn all_properties(&self) -> HashMap<String, String>;

    /// Stable identifier distinguishing this device/installation
    fn distinct_id(&self) -> String;
}

/// A [`PropertySource`] over a fixed property map
#[derive(Debug, Clone, Default)]
pub struct StaticPropertySource {
    properties: HashMap<String, String>,
    distinct_id: String,
}

impl StaticPropertySource {
    /// Create a source with the given distinct id and no properties
    #[must_use]
    pub fn new(distinct_id: impl Into<String>) -> Self {
        Self {
            properties: HashMap::new(),
            distinct_id: distinct_id.into(),
        }
    }

    /// With a resolved property
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

impl PropertySource for StaticPropertySource {
    fn all_properties(&self) -> HashMap<String, String> {
        self.properties.clone()
    }

    fn distinct_id(&self) -> String {
        self.distinct_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_property_ignores_context() {
        let prop = CustomProperty::new("prop1", PropertyType::Int, 123i64);
        assert_eq!(prop.value(None), PropertyValue::Int(123));

        let context: PropertyContext =
            [("ignored".to_string(), PropertyValue::Bool(true))].into();
        assert_eq!(prop.value(Some(&context)), PropertyValue::Int(123));
    }

    #[test]
    fn computed_property_receives_context() {
        let prop = CustomProperty::computed("prop1", PropertyType::String, |_ctx| {
            PropertyValue::String("123".to_string())
        });
        assert_eq!(
            prop.value(Some(&PropertyContext::new())),
            PropertyValue::String("123".to_string())
        );
        assert_eq!(prop.value(None), PropertyValue::String("123".to_string()));
    }

    #[test]
    fn computed_property_can_read_context() {
        let prop = CustomProperty::computed("plan", PropertyType::String, |ctx| {
            ctx.and_then(|c| c.get("plan").cloned())
                .unwrap_or_else(|| PropertyValue::String("free".to_string()))
        });

        assert_eq!(prop.value(None), PropertyValue::String("free".to_string()));

        let context: PropertyContext =
            [("plan".to_string(), PropertyValue::String("pro".to_string()))].into();
        assert_eq!(
            prop.value(Some(&context)),
            PropertyValue::String("pro".to_string())
        );
    }

    #[test]
    fn device_property_is_namespaced_once() {
        let prop = DeviceProperty::new("platform", PropertyType::String, "linux");
        assert_eq!(prop.name(), "rox.platform");
        assert_eq!(prop.value(None), PropertyValue::String("linux".to_string()));
    }

    #[test]
    fn property_value_types() {
        assert_eq!(PropertyValue::Int(1).type_of(), PropertyType::Int);
        assert_eq!(PropertyValue::Float(1.5).type_of(), PropertyType::Float);
        assert_eq!(PropertyValue::Bool(true).type_of(), PropertyType::Bool);
        assert_eq!(
            PropertyValue::Semver("1.2.3".to_string()).type_of(),
            PropertyType::Semver
        );
    }

    #[test]
    fn property_value_display() {
        assert_eq!(PropertyValue::Int(42).to_string(), "42");
        assert_eq!(PropertyValue::Bool(false).to_string(), "false");
        assert_eq!(
            PropertyValue::Semver("1.2.3".to_string()).to_string(),
            "1.2.3"
        );
    }

    #[test]
    fn static_property_source() {
        let source = StaticPropertySource::new("device-1")
            .with_property("platform", "linux")
            .with_property("app_release", "1.0.0");

        assert_eq!(source.distinct_id(), "device-1");
        let props = source.all_properties();
        assert_eq!(props.get("platform").map(String::as_str), Some("linux"));
        assert_eq!(props.len(), 2);
    }
}
