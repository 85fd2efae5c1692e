/*!
 Data structures produced by the MOF deserializer: classes, instances, and the declarations and values they carry.
*/

use std::{
    fmt::{Display, Formatter, Result},
    sync::Arc,
};

use bitflags::bitflags;
use chrono::{DateTime, FixedOffset, TimeDelta};
use indexmap::IndexMap;

use crate::util::dates::format_dmtf;

/// Added to a scalar type tag to form the matching array type tag
const ARRAY_FLAG: u8 = 0x10;

/// The CIM type of a property, qualifier, parameter, or method return value
///
/// Discriminants are the type tags used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CimType {
    Boolean = 0,
    UInt8 = 1,
    SInt8 = 2,
    UInt16 = 3,
    SInt16 = 4,
    UInt32 = 5,
    SInt32 = 6,
    UInt64 = 7,
    SInt64 = 8,
    Real32 = 9,
    Real64 = 10,
    Char16 = 11,
    DateTime = 12,
    String = 13,
    Reference = 14,
    /// An embedded instance
    Instance = 15,
    BooleanArray = 16,
    UInt8Array = 17,
    SInt8Array = 18,
    UInt16Array = 19,
    SInt16Array = 20,
    UInt32Array = 21,
    SInt32Array = 22,
    UInt64Array = 23,
    SInt64Array = 24,
    Real32Array = 25,
    Real64Array = 26,
    Char16Array = 27,
    DateTimeArray = 28,
    StringArray = 29,
    ReferenceArray = 30,
    InstanceArray = 31,
}

/// Every type, indexed by its tag
const ALL_TYPES: [CimType; 32] = [
    CimType::Boolean,
    CimType::UInt8,
    CimType::SInt8,
    CimType::UInt16,
    CimType::SInt16,
    CimType::UInt32,
    CimType::SInt32,
    CimType::UInt64,
    CimType::SInt64,
    CimType::Real32,
    CimType::Real64,
    CimType::Char16,
    CimType::DateTime,
    CimType::String,
    CimType::Reference,
    CimType::Instance,
    CimType::BooleanArray,
    CimType::UInt8Array,
    CimType::SInt8Array,
    CimType::UInt16Array,
    CimType::SInt16Array,
    CimType::UInt32Array,
    CimType::SInt32Array,
    CimType::UInt64Array,
    CimType::SInt64Array,
    CimType::Real32Array,
    CimType::Real64Array,
    CimType::Char16Array,
    CimType::DateTimeArray,
    CimType::StringArray,
    CimType::ReferenceArray,
    CimType::InstanceArray,
];

impl CimType {
    /// Look up the type for a wire tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        ALL_TYPES.get(tag as usize).copied()
    }

    /// The wire tag for this type
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_array(self) -> bool {
        self.tag() & ARRAY_FLAG != 0
    }

    /// The type of each element for an array type, or the type itself for a scalar
    pub fn element_type(self) -> Self {
        ALL_TYPES[(self.tag() & !ARRAY_FLAG) as usize]
    }

    /// The array type whose elements are this type's element type
    pub fn array_type(self) -> Self {
        ALL_TYPES[(self.tag() | ARRAY_FLAG) as usize]
    }

    /// Whether declarations of this type may name a class
    pub fn accepts_class(self) -> bool {
        matches!(self.element_type(), CimType::Reference | CimType::Instance)
    }

    /// The MOF keyword for the element type
    fn keyword(self) -> &'static str {
        match self.element_type() {
            CimType::Boolean => "boolean",
            CimType::UInt8 => "uint8",
            CimType::SInt8 => "sint8",
            CimType::UInt16 => "uint16",
            CimType::SInt16 => "sint16",
            CimType::UInt32 => "uint32",
            CimType::SInt32 => "sint32",
            CimType::UInt64 => "uint64",
            CimType::SInt64 => "sint64",
            CimType::Real32 => "real32",
            CimType::Real64 => "real64",
            CimType::Char16 => "char16",
            CimType::DateTime => "datetime",
            CimType::String => "string",
            CimType::Reference => "ref",
            _ => "object",
        }
    }
}

impl Display for CimType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        if self.is_array() {
            write!(fmt, "{}[]", self.keyword())
        } else {
            write!(fmt, "{}", self.keyword())
        }
    }
}

bitflags! {
    /// Controls how a qualifier propagates to subclasses and whether it may be overridden
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flavor: u32 {
        const ENABLE_OVERRIDE = 0x80;
        const DISABLE_OVERRIDE = 0x100;
        const RESTRICTED = 0x200;
        const TO_SUBCLASS = 0x400;
        const TRANSLATABLE = 0x800;
    }
}

impl Flavor {
    /// Whether a qualifier with this flavor is inherited by subclasses
    pub fn propagates(&self) -> bool {
        self.contains(Flavor::TO_SUBCLASS)
    }

    /// Whether a subclass may change the value of a qualifier with this flavor
    pub fn overridable(&self) -> bool {
        !self.contains(Flavor::DISABLE_OVERRIDE)
    }

    /// Fill in the CIM defaults for unset pairs, or `None` if both halves of a pair are set
    pub fn with_defaults(self) -> Option<Flavor> {
        let overrides = Flavor::ENABLE_OVERRIDE | Flavor::DISABLE_OVERRIDE;
        let scope = Flavor::TO_SUBCLASS | Flavor::RESTRICTED;
        if self.contains(overrides) || self.contains(scope) {
            return None;
        }

        let mut flavor = self;
        if !flavor.intersects(overrides) {
            flavor |= Flavor::ENABLE_OVERRIDE;
        }
        if !flavor.intersects(scope) {
            flavor |= Flavor::TO_SUBCLASS;
        }
        Some(flavor)
    }
}

bitflags! {
    /// Attributes of a property or parameter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ElementFlags: u32 {
        const KEY = 0x1000;
        const IN = 0x2000;
        const OUT = 0x4000;
        const REQUIRED = 0x8000;
        const STATIC = 0x10000;
        const ABSTRACT = 0x20000;
        const TERMINAL = 0x40000;
        const EXPENSIVE = 0x80000;
        const STREAM = 0x100000;
        const READONLY = 0x200000;
    }
}

/// A CIM `datetime` value, either a point in time or a duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CimDateTime {
    Timestamp(DateTime<FixedOffset>),
    Interval(TimeDelta),
}

impl Display for CimDateTime {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        write!(fmt, "{}", format_dmtf(self))
    }
}

/// A decoded value; the variant always matches the declared [`CimType`]
#[derive(Debug, Clone, PartialEq)]
pub enum CimValue {
    Boolean(bool),
    UInt8(u8),
    SInt8(i8),
    UInt16(u16),
    SInt16(i16),
    UInt32(u32),
    SInt32(i32),
    UInt64(u64),
    SInt64(i64),
    Real32(f32),
    Real64(f64),
    /// A single UTF-16 code unit
    Char16(u16),
    DateTime(CimDateTime),
    String(String),
    /// An object path
    Reference(String),
    Instance(Box<CimInstance>),
    /// Elements all share the declared element type
    Array(Vec<CimValue>),
}

impl CimValue {
    /// The text of a string or reference value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CimValue::String(text) | CimValue::Reference(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CimValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl Display for CimValue {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            CimValue::Boolean(value) => write!(fmt, "{value}"),
            CimValue::UInt8(value) => write!(fmt, "{value}"),
            CimValue::SInt8(value) => write!(fmt, "{value}"),
            CimValue::UInt16(value) => write!(fmt, "{value}"),
            CimValue::SInt16(value) => write!(fmt, "{value}"),
            CimValue::UInt32(value) => write!(fmt, "{value}"),
            CimValue::SInt32(value) => write!(fmt, "{value}"),
            CimValue::UInt64(value) => write!(fmt, "{value}"),
            CimValue::SInt64(value) => write!(fmt, "{value}"),
            CimValue::Real32(value) => write!(fmt, "{value}"),
            CimValue::Real64(value) => write!(fmt, "{value}"),
            CimValue::Char16(unit) => match char::from_u32(*unit as u32) {
                Some(letter) => write!(fmt, "{letter}"),
                None => write!(fmt, "\\x{unit:04X}"),
            },
            CimValue::DateTime(value) => write!(fmt, "{value}"),
            CimValue::String(value) | CimValue::Reference(value) => write!(fmt, "{value}"),
            CimValue::Instance(instance) => write!(fmt, "instance of {}", instance.class.name),
            CimValue::Array(items) => {
                write!(fmt, "{{")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(fmt, ", ")?;
                    }
                    write!(fmt, "{item}")?;
                }
                write!(fmt, "}}")
            }
        }
    }
}

/// Fold a CIM name for case-insensitive comparison
pub(crate) fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// An insertion-ordered collection of named items with case-insensitive lookup
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMap<T> {
    items: IndexMap<String, T>,
}

impl<T> NamedMap<T> {
    pub fn new() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find an item by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.get(&fold_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(&fold_name(name))
    }

    /// Items in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    /// Insert an item, replacing any item with the same name in its original position
    pub(crate) fn insert(&mut self, name: &str, item: T) -> Option<T> {
        self.items.insert(fold_name(name), item)
    }
}

impl<T> Default for NamedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for NamedMap<T> {
    type Item = T;
    type IntoIter = indexmap::map::IntoValues<String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

impl<'a, T> IntoIterator for &'a NamedMap<T> {
    type Item = &'a T;
    type IntoIter = indexmap::map::Values<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

/// A metadata annotation on a class, property, method, or parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Qualifier {
    pub name: String,
    pub cim_type: CimType,
    pub flavor: Flavor,
    pub value: Option<CimValue>,
    /// Whether this qualifier was inherited rather than declared on the element
    pub propagated: bool,
}

/// A property declared on a class
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDeclaration {
    pub name: String,
    pub cim_type: CimType,
    pub flags: ElementFlags,
    /// The class a reference or embedded instance must be an instance of
    pub reference_class: Option<String>,
    pub qualifiers: NamedMap<Qualifier>,
    pub default: Option<CimValue>,
    /// The name of the class that declared this version of the property
    pub class_origin: String,
    /// Whether this property was inherited without being redeclared
    pub propagated: bool,
}

/// A parameter of a method
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDeclaration {
    pub name: String,
    pub cim_type: CimType,
    pub flags: ElementFlags,
    pub reference_class: Option<String>,
    pub qualifiers: NamedMap<Qualifier>,
}

/// A method declared on a class
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    pub name: String,
    pub return_type: CimType,
    pub qualifiers: NamedMap<Qualifier>,
    pub parameters: NamedMap<ParameterDeclaration>,
    pub class_origin: String,
    pub propagated: bool,
}

/// A class declaration, with inherited members already merged in
#[derive(Debug, Clone, PartialEq)]
pub struct CimClass {
    pub name: String,
    /// Shared with every other subclass of the same parent
    pub superclass: Option<Arc<CimClass>>,
    pub server_name: String,
    pub namespace: String,
    pub qualifiers: NamedMap<Qualifier>,
    /// Inherited properties first, then new ones, in declaration order
    pub properties: NamedMap<PropertyDeclaration>,
    pub methods: NamedMap<MethodDeclaration>,
}

impl CimClass {
    /// Create a root class with no members, e.g. to answer a class resolver
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            superclass: None,
            server_name: String::new(),
            namespace: namespace.to_string(),
            qualifiers: NamedMap::new(),
            properties: NamedMap::new(),
            methods: NamedMap::new(),
        }
    }

    pub fn superclass_name(&self) -> Option<&str> {
        self.superclass.as_deref().map(|parent| parent.name.as_str())
    }

    /// Iterate this class's parents, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &CimClass> {
        std::iter::successors(self.superclass.as_deref(), |class| {
            class.superclass.as_deref()
        })
    }

    /// Whether this class is `name` or inherits from it
    pub fn derives_from(&self, name: &str) -> bool {
        let name = fold_name(name);
        fold_name(&self.name) == name || self.ancestors().any(|class| fold_name(&class.name) == name)
    }

    /// Whether the `Abstract` qualifier is set
    pub fn is_abstract(&self) -> bool {
        self.qualifiers
            .get("abstract")
            .and_then(|qualifier| qualifier.value.as_ref())
            .and_then(CimValue::as_bool)
            .unwrap_or(false)
    }
}

/// A property value carried by an instance
#[derive(Debug, Clone, PartialEq)]
pub struct CimProperty {
    pub name: String,
    /// Always the type declared on the class
    pub cim_type: CimType,
    /// `None` when the instance sets the property to `NULL`
    pub value: Option<CimValue>,
}

/// An instance of a class
#[derive(Debug, Clone, PartialEq)]
pub struct CimInstance {
    pub class: Arc<CimClass>,
    /// Only the properties the instance sets, in encoding order
    pub properties: NamedMap<CimProperty>,
}

impl CimInstance {
    pub fn class_name(&self) -> &str {
        &self.class.name
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::mof::models::{CimClass, CimType, CimValue, NamedMap};

    #[test]
    fn can_get_type_from_tag() {
        assert_eq!(CimType::from_tag(13), Some(CimType::String));
        assert_eq!(CimType::from_tag(29), Some(CimType::StringArray));
        assert_eq!(CimType::from_tag(32), None);
        assert_eq!(CimType::StringArray.element_type(), CimType::String);
        assert!(CimType::InstanceArray.is_array());
        assert!(!CimType::Instance.is_array());
        assert_eq!(CimType::Reference.array_type(), CimType::ReferenceArray);
        assert_eq!(CimType::UInt8Array.array_type(), CimType::UInt8Array);
    }

    #[test]
    fn can_display_types() {
        assert_eq!(CimType::UInt8.to_string(), "uint8");
        assert_eq!(CimType::ReferenceArray.to_string(), "ref[]");
    }

    #[test]
    fn named_map_ignores_case_and_keeps_order() {
        let mut map = NamedMap::new();
        map.insert("Zeta", 1);
        map.insert("alpha", 2);
        map.insert("ZETA", 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("zeta"), Some(&3));
        assert_eq!(map.iter().copied().collect::<Vec<_>>(), vec![3, 2]);
    }

    #[test]
    fn can_walk_ancestors() {
        let root = Arc::new(CimClass::new("CIM_ManagedElement", "root/cimv2"));
        let mut child = CimClass::new("CIM_LogicalElement", "root/cimv2");
        child.superclass = Some(Arc::clone(&root));

        assert!(child.derives_from("cim_managedelement"));
        assert!(child.derives_from("CIM_LogicalElement"));
        assert!(!root.derives_from("CIM_LogicalElement"));
        assert_eq!(child.superclass_name(), Some("CIM_ManagedElement"));
    }

    #[test]
    fn can_display_array() {
        let value = CimValue::Array(vec![CimValue::UInt8(1), CimValue::UInt8(2)]);

        assert_eq!(value.to_string(), "{1, 2}");
    }
}
