use serde::{Deserialize, Serialize};
use std::fmt;

pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Boolean)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Short
                | PrimitiveKind::Char
                | PrimitiveKind::Int
                | PrimitiveKind::Long
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "java.lang.Boolean",
            PrimitiveKind::Byte => "java.lang.Byte",
            PrimitiveKind::Short => "java.lang.Short",
            PrimitiveKind::Char => "java.lang.Character",
            PrimitiveKind::Int => "java.lang.Integer",
            PrimitiveKind::Long => "java.lang.Long",
            PrimitiveKind::Float => "java.lang.Float",
            PrimitiveKind::Double => "java.lang.Double",
        }
    }

    pub fn from_boxed_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|p| p.boxed_name() == name)
    }

    pub fn all() -> [PrimitiveKind; 8] {
        [
            PrimitiveKind::Boolean,
            PrimitiveKind::Byte,
            PrimitiveKind::Short,
            PrimitiveKind::Char,
            PrimitiveKind::Int,
            PrimitiveKind::Long,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
        ]
    }

    /// Primitive subtyping: identity plus the widening chain
    /// `byte < short < int < long < float < double` with `char < int`.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        use PrimitiveKind::*;
        if self == target {
            return true;
        }
        match (self, target) {
            (Boolean, _) | (_, Boolean) => false,
            (Char, Byte | Short) => false,
            (Byte | Short, Char) => false,
            _ => self.rank() < target.rank(),
        }
    }

    fn rank(self) -> u8 {
        match self {
            PrimitiveKind::Boolean => 0,
            PrimitiveKind::Byte => 1,
            PrimitiveKind::Short | PrimitiveKind::Char => 2,
            PrimitiveKind::Int => 3,
            PrimitiveKind::Long => 4,
            PrimitiveKind::Float => 5,
            PrimitiveKind::Double => 6,
        }
    }

    /// Binary numeric promotion of two unboxed operand kinds.
    pub fn promote(left: PrimitiveKind, right: PrimitiveKind) -> PrimitiveKind {
        use PrimitiveKind::*;
        if left == Double || right == Double {
            Double
        } else if left == Float || right == Float {
            Float
        } else if left == Long || right == Long {
            Long
        } else {
            Int
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypeRef {
    Primitive {
        kind: PrimitiveKind,
    },
    Class {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeRef>,
    },
    Array {
        element: Box<TypeRef>,
    },
    TypeVar {
        name: String,
        bound: Box<TypeRef>,
    },
    Union {
        alternatives: Vec<TypeRef>,
    },
    Null,
    Void,
}

impl TypeRef {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        TypeRef::Primitive { kind }
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean)
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int)
    }

    pub fn long() -> Self {
        Self::primitive(PrimitiveKind::Long)
    }

    pub fn double() -> Self {
        Self::primitive(PrimitiveKind::Double)
    }

    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args,
        }
    }

    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array {
            element: Box::new(element),
        }
    }

    pub fn type_var(name: impl Into<String>, bound: TypeRef) -> Self {
        TypeRef::TypeVar {
            name: name.into(),
            bound: Box::new(bound),
        }
    }

    pub fn union(alternatives: Vec<TypeRef>) -> Self {
        TypeRef::Union { alternatives }
    }

    pub fn string() -> Self {
        Self::class(STRING)
    }

    pub fn object() -> Self {
        Self::class(OBJECT)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            TypeRef::Primitive { kind } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.as_primitive().is_some()
    }

    pub fn is_numeric(&self) -> bool {
        self.as_primitive().is_some_and(PrimitiveKind::is_numeric)
    }

    pub fn is_integral(&self) -> bool {
        self.as_primitive().is_some_and(PrimitiveKind::is_integral)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.as_primitive(), Some(PrimitiveKind::Boolean))
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TypeRef::Class { .. }
                | TypeRef::Array { .. }
                | TypeRef::TypeVar { .. }
                | TypeRef::Union { .. }
                | TypeRef::Null
        )
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeRef::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        self.class_name() == Some(STRING)
    }

    /// The primitive a boxed class such as `java.lang.Integer` wraps.
    pub fn boxed_primitive(&self) -> Option<PrimitiveKind> {
        self.class_name().and_then(PrimitiveKind::from_boxed_name)
    }

    pub fn is_boxed_primitive(&self) -> bool {
        self.boxed_primitive().is_some()
    }

    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array { element } => Some(element),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.element_type().is_some()
    }

    /// Strips type variables down to their concrete upper bound.
    pub fn resolve_bound(&self) -> &TypeRef {
        let mut current = self;
        while let TypeRef::TypeVar { bound, .. } = current {
            current = bound;
        }
        current
    }

    pub fn simple_name(&self) -> String {
        match self {
            TypeRef::Class { name, args } => {
                let short = name.rsplit('.').next().unwrap_or(name);
                if args.is_empty() {
                    short.to_string()
                } else {
                    let args: Vec<String> = args.iter().map(|a| a.simple_name()).collect();
                    format!("{}<{}>", short, args.join(", "))
                }
            }
            TypeRef::Array { element } => format!("{}[]", element.simple_name()),
            TypeRef::Union { alternatives } => alternatives
                .iter()
                .map(|a| a.simple_name())
                .collect::<Vec<_>>()
                .join(" | "),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive { kind } => write!(f, "{}", kind),
            TypeRef::Class { name, args } if args.is_empty() => write!(f, "{}", name),
            TypeRef::Class { name, args } => {
                write!(f, "{}<", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeRef::Array { element } => write!(f, "{}[]", element),
            TypeRef::TypeVar { name, .. } => write!(f, "{}", name),
            TypeRef::Union { alternatives } => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", alt)?;
                }
                Ok(())
            }
            TypeRef::Null => write!(f, "null"),
            TypeRef::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_chain() {
        use PrimitiveKind::*;
        assert!(Byte.widens_to(Int));
        assert!(Char.widens_to(Long));
        assert!(Int.widens_to(Float));
        assert!(!Char.widens_to(Short));
        assert!(!Short.widens_to(Char));
        assert!(!Long.widens_to(Int));
        assert!(!Boolean.widens_to(Int));
        assert!(Boolean.widens_to(Boolean));
    }

    #[test]
    fn test_promotion() {
        use PrimitiveKind::*;
        assert_eq!(PrimitiveKind::promote(Byte, Short), Int);
        assert_eq!(PrimitiveKind::promote(Int, Long), Long);
        assert_eq!(PrimitiveKind::promote(Float, Long), Float);
        assert_eq!(PrimitiveKind::promote(Char, Double), Double);
    }

    #[test]
    fn test_boxed_lookup() {
        let integer = TypeRef::class("java.lang.Integer");
        assert_eq!(integer.boxed_primitive(), Some(PrimitiveKind::Int));
        assert!(!TypeRef::string().is_boxed_primitive());
        assert_eq!(integer.simple_name(), "Integer");
    }

    #[test]
    fn test_resolve_bound() {
        let t = TypeRef::type_var("E", TypeRef::type_var("F", TypeRef::class("java.io.IOException")));
        assert_eq!(t.resolve_bound(), &TypeRef::class("java.io.IOException"));
    }
}
