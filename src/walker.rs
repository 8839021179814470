//! Symbol graph walker - applies the rename table to every renameable
//! name a module carries.
//!
//! Per type definition, nested types are visited first, then in order:
//! namespace, attributes, methods, properties, fields, interface
//! implementations, events and generic parameters. Type usages are
//! rewritten through their [`TypeRef`] rows: wrappers are unwrapped to the
//! named element, a non-empty namespace is rewritten in namespace position,
//! an empty one is checked for the display-class pattern, and the declaring
//! chain is followed for nested references. Method bodies have exactly
//! three renameable operand shapes: string loads, field accesses and calls.

use crate::event::{RenameEvent, RenameSink, SymbolKind};
use crate::module::{
    AttributeUse, AttributeValue, GenericParam, Instruction, Method, MethodBody, Module, TypeDef,
    TypeRef, TypeRefId, TypeSpec,
};
use crate::rename::{NamePattern, RenameTable};

/// Walks one module's symbol graph and rewrites names in place.
pub struct Walker<'a> {
    table: &'a RenameTable,
    module_name: String,
    sink: &'a mut dyn RenameSink,
}

impl<'a> Walker<'a> {
    pub fn new(
        table: &'a RenameTable,
        module_name: impl Into<String>,
        sink: &'a mut dyn RenameSink,
    ) -> Self {
        Self {
            table,
            module_name: module_name.into(),
            sink,
        }
    }

    /// Apply the per-row rule to every row of the type-reference table.
    pub fn sweep_type_refs(&mut self, module: &mut Module) {
        for index in 0..module.type_refs.len() {
            self.rewrite_ref_row(&mut module.type_refs, TypeRefId(index as u32));
        }
    }

    /// Rewrite every type definition, nested types first.
    pub fn walk_types(&mut self, module: &mut Module) {
        let Module {
            types, type_refs, ..
        } = module;
        for ty in types.iter_mut() {
            self.walk_type(ty, type_refs);
        }
    }

    fn walk_type(&mut self, ty: &mut TypeDef, type_refs: &mut [TypeRef]) {
        for nested in &mut ty.nested {
            self.walk_type(nested, type_refs);
        }

        if let Some(namespace) = self.table.resolve(&ty.namespace, NamePattern::Namespace) {
            let before = ty.full_name();
            ty.namespace = namespace;
            self.emit(SymbolKind::Namespace, before, ty.full_name());
        }

        self.rewrite_attributes(&mut ty.attributes, type_refs);

        for method in &mut ty.methods {
            self.rewrite_method(method, type_refs);
        }

        for property in &mut ty.properties {
            self.rewrite_attributes(&mut property.attributes, type_refs);
            self.rewrite_name(SymbolKind::Member, NamePattern::DottedMember, &mut property.name);
            if let Some(getter) = &mut property.getter {
                self.rewrite_method(getter, type_refs);
            }
            if let Some(setter) = &mut property.setter {
                self.rewrite_method(setter, type_refs);
            }
            // compiler-synthesized backing-field shape
            self.rewrite_name(SymbolKind::Member, NamePattern::BracketBacking, &mut property.name);
        }

        for field in &mut ty.fields {
            self.rewrite_attributes(&mut field.attributes, type_refs);
            self.rewrite_name(SymbolKind::Member, NamePattern::DottedMember, &mut field.name);
        }

        for interface in &mut ty.interfaces {
            self.rewrite_attributes(&mut interface.attributes, type_refs);
            self.rewrite_type_spec(&interface.interface, type_refs);
        }

        for event in &mut ty.events {
            self.rewrite_attributes(&mut event.attributes, type_refs);
            self.rewrite_type_spec(&event.event_type, type_refs);
        }

        for generic in &mut ty.generic_params {
            self.rewrite_attributes(&mut generic.attributes, type_refs);
            self.rewrite_generic_param(generic);
        }
    }

    fn rewrite_method(&mut self, method: &mut Method, type_refs: &mut [TypeRef]) {
        self.rewrite_attributes(&mut method.attributes, type_refs);
        self.rewrite_name(SymbolKind::Member, NamePattern::DottedMember, &mut method.name);

        for method_override in &mut method.overrides {
            // explicit implementation of a generic interface embeds the
            // identifier as `<Old` in the method's own name
            self.rewrite_name(
                SymbolKind::Member,
                NamePattern::BracketOverride,
                &mut method.name,
            );
            for generic in &mut method_override.generic_params {
                self.rewrite_attributes(&mut generic.attributes, type_refs);
                self.rewrite_generic_param(generic);
            }
            self.rewrite_name(
                SymbolKind::Member,
                NamePattern::DottedMember,
                &mut method_override.target.name,
            );
        }

        for generic in &mut method.generic_params {
            self.rewrite_attributes(&mut generic.attributes, type_refs);
            self.rewrite_generic_param(generic);
        }

        for param in &mut method.params {
            self.rewrite_attributes(&mut param.attributes, type_refs);
            self.rewrite_type_spec(&param.param_type, type_refs);
        }
        self.rewrite_type_spec(&method.return_type, type_refs);

        if let Some(body) = &mut method.body {
            self.rewrite_body(body, type_refs);
        }
    }

    fn rewrite_body(&mut self, body: &mut MethodBody, type_refs: &mut [TypeRef]) {
        for instruction in &mut body.instructions {
            match instruction {
                Instruction::LoadString(literal) => {
                    self.rewrite_name(
                        SymbolKind::InstructionOperand,
                        NamePattern::DottedPrefix,
                        literal,
                    );
                }
                Instruction::LoadField(field) | Instruction::StoreField(field) => {
                    self.rewrite_name(
                        SymbolKind::InstructionOperand,
                        NamePattern::DottedMember,
                        &mut field.name,
                    );
                    self.rewrite_type_spec(&field.declaring, type_refs);
                }
                Instruction::Call {
                    method,
                    generic_args,
                } => {
                    self.rewrite_name(
                        SymbolKind::InstructionOperand,
                        NamePattern::DottedMember,
                        &mut method.name,
                    );
                    for arg in generic_args.iter() {
                        self.rewrite_type_spec(arg, type_refs);
                    }
                }
                _ => {}
            }
        }
    }

    fn rewrite_attributes(&mut self, attributes: &mut [AttributeUse], type_refs: &mut [TypeRef]) {
        for attribute in attributes {
            self.rewrite_type_spec(&attribute.attr_type, type_refs);
            self.rewrite_name(
                SymbolKind::Member,
                NamePattern::DottedMember,
                &mut attribute.ctor.name,
            );

            for arg in &mut attribute.args {
                self.rewrite_type_spec(&arg.arg_type, type_refs);
                if let AttributeValue::TypeOf(spec) = &arg.value {
                    self.rewrite_type_spec(spec, type_refs);
                }
            }
            for named in &mut attribute.named_args {
                self.rewrite_type_spec(&named.arg_type, type_refs);
            }
        }
    }

    fn rewrite_generic_param(&mut self, generic: &mut GenericParam) {
        for constraint in &mut generic.constraints {
            self.rewrite_name(SymbolKind::GenericParameter, NamePattern::Bare, constraint);
        }
        for nested in &mut generic.nested {
            self.rewrite_generic_param(nested);
        }
    }

    /// Rewrite a type usage through its row: unwrap to the named element,
    /// rewrite the row text, then follow the declaring chain.
    fn rewrite_type_spec(&mut self, spec: &TypeSpec, type_refs: &mut [TypeRef]) {
        if let Some(id) = spec.element_ref() {
            self.rewrite_ref_row(type_refs, id);
        }
    }

    fn rewrite_ref_row(&mut self, type_refs: &mut [TypeRef], id: TypeRefId) {
        // a well-formed declaring chain visits each row at most once; cap
        // the hops so a cyclic chain in corrupt input cannot loop forever
        let mut hops = type_refs.len();
        let mut next = Some(id);
        while let Some(id) = next {
            if hops == 0 {
                return;
            }
            hops -= 1;
            let Some(row) = type_refs.get_mut(id.index()) else {
                return;
            };
            if !row.namespace.is_empty() {
                if let Some(namespace) = self.table.resolve(&row.namespace, NamePattern::Namespace)
                {
                    let before = row.full_name();
                    row.namespace = namespace;
                    let after = row.full_name();
                    self.emit(SymbolKind::Type, before, after);
                }
            } else if let Some(name) = self.table.resolve(&row.name, NamePattern::BracketDisplay) {
                let before = row.full_name();
                row.name = name;
                let after = row.full_name();
                self.emit(SymbolKind::Type, before, after);
            }
            next = row.declaring;
        }
    }

    fn rewrite_name(&mut self, kind: SymbolKind, pattern: NamePattern, name: &mut String) {
        if let Some(renamed) = self.table.resolve(name, pattern) {
            self.emit(kind, name.clone(), renamed.clone());
            *name = renamed;
        }
    }

    fn emit(&mut self, kind: SymbolKind, before: impl Into<String>, after: impl Into<String>) {
        self.sink.record(RenameEvent {
            module: self.module_name.clone(),
            kind,
            before: before.into(),
            after: after.into(),
        });
    }
}
