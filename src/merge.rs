//! Merge tool - folds several rewritten modules into one.
//!
//! The first output path is the primary; every other module is swallowed
//! into it. Swallowed top-level types are appended with their visibility
//! forced to internal, their type-reference rows are appended with ids and
//! scopes remapped, and module references are unioned minus the merged
//! modules themselves. The result replaces the primary on disk, signed
//! when a key file is supplied.

use crate::codec;
use crate::module::{
    AttributeUse, AttributeValue, GenericParam, Instruction, Method, Module, ModuleRefId, TypeDef,
    TypeRefId, TypeSpec, Visibility,
};
use crate::resolver::ModuleResolver;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Merge already-rewritten modules into the first output path.
pub fn merge_modules(output_paths: &[PathBuf], keyfile: Option<&Path>) -> Result<()> {
    let Some((primary_path, rest)) = output_paths.split_first() else {
        return Err(Error::Merge("no output paths to merge".to_string()));
    };

    // dependencies between the outputs resolve against the output directories
    let resolver = ModuleResolver::new(
        output_paths
            .iter()
            .filter_map(|path| path.parent().map(Path::to_path_buf)),
    );

    let mut primary = codec::load(primary_path, &resolver)?;
    let mut swallowed = Vec::with_capacity(rest.len());
    for path in rest {
        swallowed.push(codec::load(path, &resolver)?);
    }

    let merged_names: HashSet<String> = std::iter::once(primary.name.clone())
        .chain(swallowed.iter().map(|module| module.name.clone()))
        .collect();

    tracing::info!(
        "merging {} modules into {}",
        output_paths.len(),
        primary.name
    );

    drop_internal_references(&mut primary, &merged_names);
    for module in swallowed {
        tracing::info!("internalizing {} into {}", module.name, primary.name);
        fold(&mut primary, module, &merged_names)?;
    }

    match keyfile {
        Some(keyfile) => {
            let key = codec::signing_key(&std::fs::read(keyfile)?);
            codec::write_signed(&primary, primary_path, &key)?;
            tracing::info!("signed merged module with {}", keyfile.display());
        }
        None => codec::write(&primary, primary_path)?,
    }
    tracing::info!("finished merging into {}", primary_path.display());
    Ok(())
}

/// Drop the primary's references to modules it is about to swallow,
/// retargeting its rows onto the compacted reference list.
fn drop_internal_references(primary: &mut Module, merged_names: &HashSet<String>) {
    let mut kept = Vec::new();
    let mut scope_map = Vec::with_capacity(primary.references.len());
    for reference in primary.references.drain(..) {
        if merged_names.contains(&reference.name) {
            scope_map.push(None);
        } else {
            kept.push(reference);
            scope_map.push(Some(ModuleRefId((kept.len() - 1) as u32)));
        }
    }
    primary.references = kept;

    // a row carrying an out-of-range scope id degrades to internal scope
    for row in &mut primary.type_refs {
        row.scope = row
            .scope
            .and_then(|id| scope_map.get(id.index()).copied().flatten());
    }
}

/// Append one swallowed module's rows and types to the primary.
fn fold(primary: &mut Module, module: Module, merged_names: &HashSet<String>) -> Result<()> {
    let offset = primary.type_refs.len() as u32;

    // rows scoped to a merged module become internal; the rest union into
    // the primary's reference list
    let mut scope_map = Vec::with_capacity(module.references.len());
    for reference in module.references {
        if merged_names.contains(&reference.name) {
            scope_map.push(None);
        } else {
            scope_map.push(Some(union_reference(primary, reference.name)));
        }
    }

    for mut row in module.type_refs {
        row.scope = row
            .scope
            .and_then(|id| scope_map.get(id.index()).copied().flatten());
        row.declaring = row.declaring.map(|id| TypeRefId(id.0 + offset));
        primary.type_refs.push(row);
    }

    let existing: HashSet<String> = primary.types.iter().map(TypeDef::full_name).collect();
    for mut ty in module.types {
        if existing.contains(&ty.full_name()) {
            return Err(Error::DuplicateType(ty.full_name()));
        }
        ty.vis = Visibility::Internal;
        shift_type(&mut ty, offset);
        tracing::debug!("internalized {}", ty.full_name());
        primary.types.push(ty);
    }
    Ok(())
}

fn union_reference(primary: &mut Module, name: String) -> ModuleRefId {
    match primary
        .references
        .iter()
        .position(|reference| reference.name == name)
    {
        Some(index) => ModuleRefId(index as u32),
        None => primary.add_reference(name),
    }
}

/// Shift every row id reachable from a type definition by `offset`.
fn shift_type(ty: &mut TypeDef, offset: u32) {
    for nested in &mut ty.nested {
        shift_type(nested, offset);
    }
    if let Some(base) = &mut ty.base {
        shift_spec(base, offset);
    }
    shift_attributes(&mut ty.attributes, offset);
    for method in &mut ty.methods {
        shift_method(method, offset);
    }
    for property in &mut ty.properties {
        shift_attributes(&mut property.attributes, offset);
        shift_spec(&mut property.property_type, offset);
        if let Some(getter) = &mut property.getter {
            shift_method(getter, offset);
        }
        if let Some(setter) = &mut property.setter {
            shift_method(setter, offset);
        }
    }
    for field in &mut ty.fields {
        shift_attributes(&mut field.attributes, offset);
        shift_spec(&mut field.field_type, offset);
    }
    for interface in &mut ty.interfaces {
        shift_attributes(&mut interface.attributes, offset);
        shift_spec(&mut interface.interface, offset);
    }
    for event in &mut ty.events {
        shift_attributes(&mut event.attributes, offset);
        shift_spec(&mut event.event_type, offset);
    }
    for generic in &mut ty.generic_params {
        shift_generic(generic, offset);
    }
}

fn shift_method(method: &mut Method, offset: u32) {
    shift_attributes(&mut method.attributes, offset);
    for method_override in &mut method.overrides {
        shift_spec(&mut method_override.target.declaring, offset);
        for generic in &mut method_override.generic_params {
            shift_generic(generic, offset);
        }
    }
    for generic in &mut method.generic_params {
        shift_generic(generic, offset);
    }
    for param in &mut method.params {
        shift_attributes(&mut param.attributes, offset);
        shift_spec(&mut param.param_type, offset);
    }
    shift_spec(&mut method.return_type, offset);

    if let Some(body) = &mut method.body {
        for local in &mut body.locals {
            shift_spec(local, offset);
        }
        for instruction in &mut body.instructions {
            match instruction {
                Instruction::LoadField(member) | Instruction::StoreField(member) => {
                    shift_spec(&mut member.declaring, offset);
                }
                Instruction::Call {
                    method,
                    generic_args,
                } => {
                    shift_spec(&mut method.declaring, offset);
                    for arg in generic_args {
                        shift_spec(arg, offset);
                    }
                }
                _ => {}
            }
        }
    }
}

fn shift_attributes(attributes: &mut [AttributeUse], offset: u32) {
    for attribute in attributes {
        shift_spec(&mut attribute.attr_type, offset);
        shift_spec(&mut attribute.ctor.declaring, offset);
        for arg in &mut attribute.args {
            shift_spec(&mut arg.arg_type, offset);
            if let AttributeValue::TypeOf(spec) = &mut arg.value {
                shift_spec(spec, offset);
            }
        }
        for named in &mut attribute.named_args {
            shift_spec(&mut named.arg_type, offset);
            if let AttributeValue::TypeOf(spec) = &mut named.value {
                shift_spec(spec, offset);
            }
        }
    }
}

fn shift_generic(generic: &mut GenericParam, offset: u32) {
    shift_attributes(&mut generic.attributes, offset);
    for nested in &mut generic.nested {
        shift_generic(nested, offset);
    }
}

fn shift_spec(spec: &mut TypeSpec, offset: u32) {
    match spec {
        TypeSpec::Named(id) => id.0 += offset,
        TypeSpec::Array(inner) | TypeSpec::Pointer(inner) => shift_spec(inner, offset),
        TypeSpec::Generic { element, args } => {
            shift_spec(element, offset);
            for arg in args {
                shift_spec(arg, offset);
            }
        }
        TypeSpec::Opaque => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Field, MemberRef, MethodBody, TypeRef};
    use tempfile::TempDir;

    fn write_module(dir: &Path, module: &Module) -> PathBuf {
        let path = dir.join(format!("{}.{}", module.name, codec::MODULE_EXTENSION));
        codec::write(module, &path).unwrap();
        path
    }

    /// Primary after a rewrite run: references its renamed sibling plus an
    /// external module that is not part of the merge.
    fn primary_module() -> Module {
        let mut module = Module::new("Vendor.Acme", "Acme Client (Vendor.Acme)");
        let core = module.add_reference("Vendor.AcmeCore");
        let external = module.add_reference("External");
        let base = module.add_type_ref(TypeRef::new("Vendor.AcmeCore", "Base").with_scope(core));
        let util = module.add_type_ref(TypeRef::new("External", "Util").with_scope(external));

        let mut widget = TypeDef::new("Vendor.Acme", "Widget");
        widget.base = Some(TypeSpec::Named(base));
        widget
            .fields
            .push(Field::new("util", TypeSpec::Named(util)));
        module.types.push(widget);
        module
    }

    fn core_module() -> Module {
        let mut module = Module::new("Vendor.AcmeCore", "Acme Core (Vendor.AcmeCore)");
        let external = module.add_reference("External");
        let util = module.add_type_ref(TypeRef::new("External", "Util").with_scope(external));

        let mut base = TypeDef::new("Vendor.AcmeCore", "Base");
        base.base = Some(TypeSpec::Named(util));
        module.types.push(base);
        module
    }

    fn external_module() -> Module {
        let mut module = Module::new("External", "External");
        module.types.push(TypeDef::new("External", "Util"));
        module
    }

    #[test]
    fn test_merge_internalizes_and_remaps() {
        let dir = TempDir::new().unwrap();
        let primary_path = write_module(dir.path(), &primary_module());
        let core_path = write_module(dir.path(), &core_module());
        write_module(dir.path(), &external_module());

        merge_modules(&[primary_path.clone(), core_path], None).unwrap();

        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        let merged = codec::load(&primary_path, &resolver).unwrap();

        assert_eq!(merged.name, "Vendor.Acme");
        // the swallowed module disappears from the reference union
        assert_eq!(merged.references.len(), 1);
        assert_eq!(merged.references[0].name, "External");

        // the primary's row onto the swallowed module turned internal, the
        // external row moved with the compacted reference list
        assert_eq!(merged.type_refs[0].scope, None);
        assert_eq!(merged.type_refs[1].scope, Some(ModuleRefId(0)));
        // the swallowed module's row was appended with its scope remapped
        assert_eq!(merged.type_refs[2].full_name(), "External.Util");
        assert_eq!(merged.type_refs[2].scope, Some(ModuleRefId(0)));

        // swallowed top-level types turn internal; the primary's stay public
        assert_eq!(merged.types[0].vis, Visibility::Public);
        assert_eq!(merged.types[1].full_name(), "Vendor.AcmeCore.Base");
        assert_eq!(merged.types[1].vis, Visibility::Internal);
        // its base now points at the appended row
        assert_eq!(merged.types[1].base, Some(TypeSpec::Named(TypeRefId(2))));
    }

    #[test]
    fn test_fold_shifts_ids_throughout() {
        let mut primary = Module::new("Primary", "Primary");
        primary.add_type_ref(TypeRef::new("Primary", "Anchor"));

        let mut module = Module::new("Second", "Second");
        let outer = module.add_type_ref(TypeRef::new("Second", "Outer"));
        let nested = module.add_type_ref(TypeRef::new("", "Nested").with_declaring(outer));

        let mut ty = TypeDef::new("Second", "Runner");
        let mut method = Method::new("run");
        method.return_type = TypeSpec::Array(Box::new(TypeSpec::Named(outer)));
        method.body = Some(MethodBody {
            locals: vec![TypeSpec::Named(nested)],
            instructions: vec![
                Instruction::LoadField(MemberRef::new("count", TypeSpec::Named(nested))),
                Instruction::Call {
                    method: MemberRef::new("Go", TypeSpec::Named(outer)),
                    generic_args: vec![TypeSpec::Named(nested)],
                },
                Instruction::Return,
            ],
        });
        ty.methods.push(method);
        module.types.push(ty);

        let merged_names: HashSet<String> =
            ["Primary".to_string(), "Second".to_string()].into_iter().collect();
        fold(&mut primary, module, &merged_names).unwrap();

        // rows appended after the primary's single anchor row
        assert_eq!(primary.type_refs.len(), 3);
        assert_eq!(primary.type_refs[1].name, "Outer");
        assert_eq!(primary.type_refs[2].declaring, Some(TypeRefId(1)));

        let method = &primary.types[0].methods[0];
        assert_eq!(
            method.return_type,
            TypeSpec::Array(Box::new(TypeSpec::Named(TypeRefId(1))))
        );
        let body = method.body.as_ref().unwrap();
        assert_eq!(body.locals[0], TypeSpec::Named(TypeRefId(2)));
        match &body.instructions[1] {
            Instruction::Call {
                method,
                generic_args,
            } => {
                assert_eq!(method.declaring, TypeSpec::Named(TypeRefId(1)));
                assert_eq!(generic_args[0], TypeSpec::Named(TypeRefId(2)));
            }
            other => panic!("unexpected instruction {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_scope_ids_turn_internal() {
        let dir = TempDir::new().unwrap();

        let mut primary = Module::new("First", "First");
        primary.add_type_ref(TypeRef::new("First", "Stray").with_scope(ModuleRefId(7)));
        let primary_path = write_module(dir.path(), &primary);

        let mut second = Module::new("Second", "Second");
        second.add_type_ref(TypeRef::new("Second", "Stray").with_scope(ModuleRefId(9)));
        let second_path = write_module(dir.path(), &second);

        merge_modules(&[primary_path.clone(), second_path], None).unwrap();

        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        let merged = codec::load(&primary_path, &resolver).unwrap();
        assert_eq!(merged.type_refs.len(), 2);
        assert!(merged.type_refs.iter().all(|row| row.scope.is_none()));
    }

    #[test]
    fn test_duplicate_type_across_inputs_rejected() {
        let dir = TempDir::new().unwrap();

        let mut primary = Module::new("First", "First");
        primary.types.push(TypeDef::new("Shared", "Widget"));
        let primary_path = write_module(dir.path(), &primary);

        let mut second = Module::new("Second", "Second");
        second.types.push(TypeDef::new("Shared", "Widget"));
        let second_path = write_module(dir.path(), &second);

        let err = merge_modules(&[primary_path, second_path], None).unwrap_err();
        assert!(matches!(err, Error::DuplicateType(name) if name == "Shared.Widget"));
    }

    #[test]
    fn test_merge_with_keyfile_signs_output() {
        let dir = TempDir::new().unwrap();
        let primary_path = write_module(dir.path(), &primary_module());
        let core_path = write_module(dir.path(), &core_module());
        write_module(dir.path(), &external_module());

        let keyfile = dir.path().join("signing.key");
        std::fs::write(&keyfile, b"merge key material").unwrap();

        merge_modules(&[primary_path.clone(), core_path], Some(&keyfile)).unwrap();

        let key = codec::signing_key(b"merge key material");
        assert!(codec::verify_signature(&primary_path, &key).unwrap());
        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        assert!(codec::load(&primary_path, &resolver).is_ok());
    }

    #[test]
    fn test_merge_without_outputs_is_an_error() {
        let err = merge_modules(&[], None).unwrap_err();
        assert!(matches!(err, Error::Merge(_)));
    }

    #[test]
    fn test_single_output_merge_rewrites_in_place() {
        let dir = TempDir::new().unwrap();
        let mut module = Module::new("Solo", "Solo");
        module.types.push(TypeDef::new("Solo", "Widget"));
        let path = write_module(dir.path(), &module);

        merge_modules(&[path.clone()], None).unwrap();

        let resolver = ModuleResolver::new(vec![dir.path().to_path_buf()]);
        let merged = codec::load(&path, &resolver).unwrap();
        // nothing to fold; the module survives unchanged
        assert_eq!(merged, module);
    }
}
