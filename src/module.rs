//! Binary module model - the symbol graph a rewrite operates on.
//!
//! A [`Module`] owns three tables: the modules it references, the textual
//! type-reference rows those and its own types point into, and the type
//! definitions themselves. All symbolic names live either directly on a
//! definition or in a [`TypeRef`] row; a [`TypeSpec`] never carries text,
//! it only shapes (array/pointer/generic) a reference to a row.

use serde::{Deserialize, Serialize};

/// Index into [`Module::references`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleRefId(pub u32);

impl ModuleRefId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Index into [`Module::type_refs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRefId(pub u32);

impl TypeRefId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A single binary module: identity, dependency records and type tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Machine identifier, by convention the file stem of the module path.
    pub name: String,
    /// Human-readable identity string shown by tooling.
    pub title: String,
    /// Modules this module depends on.
    pub references: Vec<ModuleRef>,
    /// Textual rows naming types that live in this or another module.
    pub type_refs: Vec<TypeRef>,
    /// Top-level type definitions.
    pub types: Vec<TypeDef>,
}

impl Module {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            references: Vec::new(),
            type_refs: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Record a dependency on another module and return its id.
    pub fn add_reference(&mut self, name: impl Into<String>) -> ModuleRefId {
        self.references.push(ModuleRef { name: name.into() });
        ModuleRefId((self.references.len() - 1) as u32)
    }

    /// Append a type-reference row and return its id.
    pub fn add_type_ref(&mut self, type_ref: TypeRef) -> TypeRefId {
        self.type_refs.push(type_ref);
        TypeRefId((self.type_refs.len() - 1) as u32)
    }
}

/// A record naming one module dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub name: String,
}

/// A textual type-reference row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Resolution scope; `None` for types of the module itself.
    pub scope: Option<ModuleRefId>,
    /// Namespace text, empty for nested or compiler-synthesized types.
    pub namespace: String,
    pub name: String,
    /// Enclosing type for nested type references.
    pub declaring: Option<TypeRefId>,
}

impl TypeRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: None,
            namespace: namespace.into(),
            name: name.into(),
            declaring: None,
        }
    }

    pub fn with_scope(mut self, scope: ModuleRefId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_declaring(mut self, declaring: TypeRefId) -> Self {
        self.declaring = Some(declaring);
        self
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Shape of a type usage: a plain row reference or a wrapper around one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeSpec {
    Named(TypeRefId),
    Array(Box<TypeSpec>),
    Pointer(Box<TypeSpec>),
    Generic {
        element: Box<TypeSpec>,
        args: Vec<TypeSpec>,
    },
    /// A primitive or otherwise opaque type with no renameable text.
    Opaque,
}

impl TypeSpec {
    /// Unwrap array/pointer/generic shapes down to the named element row.
    pub fn element_ref(&self) -> Option<TypeRefId> {
        match self {
            TypeSpec::Named(id) => Some(*id),
            TypeSpec::Array(inner) | TypeSpec::Pointer(inner) => inner.element_ref(),
            TypeSpec::Generic { element, .. } => element.element_ref(),
            TypeSpec::Opaque => None,
        }
    }
}

/// Visibility of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Internal,
}

// ========== Type definitions ==========

/// A type definition owned by a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub namespace: String,
    pub name: String,
    pub vis: Visibility,
    pub base: Option<TypeSpec>,
    pub attributes: Vec<AttributeUse>,
    pub methods: Vec<Method>,
    pub properties: Vec<Property>,
    pub fields: Vec<Field>,
    pub interfaces: Vec<InterfaceImpl>,
    pub events: Vec<EventDef>,
    pub generic_params: Vec<GenericParam>,
    pub nested: Vec<TypeDef>,
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            vis: Visibility::Public,
            base: None,
            attributes: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
            interfaces: Vec::new(),
            events: Vec::new(),
            generic_params: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

// ========== Members ==========

/// A method definition, also used for property accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub attributes: Vec<AttributeUse>,
    pub overrides: Vec<MethodOverride>,
    pub generic_params: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: TypeSpec,
    pub body: Option<MethodBody>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            overrides: Vec::new(),
            generic_params: Vec::new(),
            params: Vec::new(),
            return_type: TypeSpec::Opaque,
            body: None,
        }
    }
}

/// An explicit-interface override target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodOverride {
    pub target: MemberRef,
    pub generic_params: Vec<GenericParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub attributes: Vec<AttributeUse>,
    pub param_type: TypeSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub attributes: Vec<AttributeUse>,
    pub property_type: TypeSpec,
    pub getter: Option<Method>,
    pub setter: Option<Method>,
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: TypeSpec) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            property_type,
            getter: None,
            setter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub attributes: Vec<AttributeUse>,
    pub field_type: TypeSpec,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: TypeSpec) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            field_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceImpl {
    pub attributes: Vec<AttributeUse>,
    pub interface: TypeSpec,
}

impl InterfaceImpl {
    pub fn new(interface: TypeSpec) -> Self {
        Self {
            attributes: Vec::new(),
            interface,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    pub attributes: Vec<AttributeUse>,
    pub event_type: TypeSpec,
}

impl EventDef {
    pub fn new(name: impl Into<String>, event_type: TypeSpec) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            event_type,
        }
    }
}

/// A generic parameter with textual constraints, nesting into its own
/// generic parameters for higher-kinded shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericParam {
    pub name: String,
    pub attributes: Vec<AttributeUse>,
    pub constraints: Vec<String>,
    pub nested: Vec<GenericParam>,
}

impl GenericParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            constraints: Vec::new(),
            nested: Vec::new(),
        }
    }
}

/// A reference to a member (method, field or constructor) of some type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRef {
    pub name: String,
    pub declaring: TypeSpec,
}

impl MemberRef {
    pub fn new(name: impl Into<String>, declaring: TypeSpec) -> Self {
        Self {
            name: name.into(),
            declaring,
        }
    }
}

// ========== Attributes ==========

/// An attribute applied to a type, member, parameter or generic parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeUse {
    pub attr_type: TypeSpec,
    pub ctor: MemberRef,
    pub args: Vec<AttributeArg>,
    pub named_args: Vec<NamedArg>,
}

impl AttributeUse {
    pub fn new(attr_type: TypeSpec, ctor: MemberRef) -> Self {
        Self {
            attr_type,
            ctor,
            args: Vec::new(),
            named_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeArg {
    pub arg_type: TypeSpec,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Bool(bool),
    TypeOf(TypeSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedArgKind {
    Property,
    Field,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub kind: NamedArgKind,
    pub arg_type: TypeSpec,
    pub value: AttributeValue,
}

// ========== Executable code ==========

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MethodBody {
    pub locals: Vec<TypeSpec>,
    pub instructions: Vec<Instruction>,
}

/// The instruction set carried in method bodies. Only string loads, field
/// accesses and calls carry renameable operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    LoadString(String),
    LoadField(MemberRef),
    StoreField(MemberRef),
    Call {
        method: MemberRef,
        generic_args: Vec<TypeSpec>,
    },
    LoadInt(i64),
    LoadLocal(u16),
    StoreLocal(u16),
    Return,
    Nop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reference_and_type_ref_ids() {
        let mut module = Module::new("Acme", "Acme Client");
        let first = module.add_reference("AcmeCore");
        let second = module.add_reference("External");
        assert_eq!(first, ModuleRefId(0));
        assert_eq!(second, ModuleRefId(1));

        let row = module.add_type_ref(TypeRef::new("AcmeCore", "Base").with_scope(first));
        assert_eq!(row, TypeRefId(0));
        assert_eq!(module.type_refs[row.index()].scope, Some(first));
    }

    #[test]
    fn test_element_ref_unwraps_wrappers() {
        let id = TypeRefId(3);
        let spec = TypeSpec::Generic {
            element: Box::new(TypeSpec::Array(Box::new(TypeSpec::Named(id)))),
            args: vec![TypeSpec::Opaque],
        };
        assert_eq!(spec.element_ref(), Some(id));
        assert_eq!(TypeSpec::Opaque.element_ref(), None);
        assert_eq!(
            TypeSpec::Pointer(Box::new(TypeSpec::Opaque)).element_ref(),
            None
        );
    }

    #[test]
    fn test_full_name_handles_empty_namespace() {
        assert_eq!(TypeRef::new("Acme", "Widget").full_name(), "Acme.Widget");
        assert_eq!(TypeRef::new("", "<Acme-c__Display").full_name(), "<Acme-c__Display");
        assert_eq!(TypeDef::new("Acme", "Widget").full_name(), "Acme.Widget");
        assert_eq!(TypeDef::new("", "Nested").full_name(), "Nested");
    }
}
