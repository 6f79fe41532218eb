//! `schema` subcommand: print a resource's attribute schema, offline.

use tabled::Tabled;

use panrule_core::schema::{self, AttrType, Attribute, Schema};
use panrule_core::{DecryptionRule, Family, NatRule, PolicyRule, SecurityRule};

use crate::cli::{GlobalOpts, OutputFormat, SchemaArgs, SchemaResource};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    path: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Flags")]
    flags: String,
    #[tabled(rename = "Values")]
    values: String,
    #[tabled(rename = "Default")]
    default: String,
}

fn kind_name(kind: &AttrType) -> &'static str {
    match kind {
        AttrType::String => "string",
        AttrType::Bool => "bool",
        AttrType::Int => "int",
        AttrType::StringSet => "set(string)",
        AttrType::StringList => "list(string)",
        AttrType::BlockList(_) => "list(block)",
        AttrType::BlockSet(_) => "set(block)",
    }
}

fn flags(attr: &Attribute) -> String {
    let mut flags = Vec::new();
    if attr.required {
        flags.push("required".to_owned());
    }
    if attr.computed {
        flags.push("computed".to_owned());
    }
    if attr.write_only {
        flags.push("write-only".to_owned());
    }
    if attr.sensitive {
        flags.push("sensitive".to_owned());
    }
    if attr.min_items > 0 {
        flags.push(format!("min {}", attr.min_items));
    }
    flags.join(", ")
}

/// Flatten nested blocks into `parent.child` rows.
fn rows(attributes: &[Attribute], prefix: &str, out: &mut Vec<AttributeRow>) {
    for attr in attributes {
        let path = if prefix.is_empty() {
            attr.name.to_owned()
        } else {
            format!("{prefix}.{}", attr.name)
        };
        out.push(AttributeRow {
            path: path.clone(),
            kind: kind_name(&attr.kind),
            flags: flags(attr),
            values: attr.enum_values.join(" | "),
            default: attr.default.as_ref().map(ToString::to_string).unwrap_or_default(),
        });
        if let AttrType::BlockList(nested) | AttrType::BlockSet(nested) = &attr.kind {
            rows(nested, &path, out);
        }
    }
}

fn schema_for<R: PolicyRule>(resource: SchemaResource) -> Schema {
    match resource {
        SchemaResource::Group => schema::rule_group_schema::<R>(),
        SchemaResource::Policy => schema::policy_schema::<R>(),
        SchemaResource::Rules => schema::rulebase_data_source_schema::<R>(),
    }
}

pub fn handle(args: &SchemaArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let schema = match super::util::family(args.family) {
        Family::Security => schema_for::<SecurityRule>(args.resource),
        Family::Decryption => schema_for::<DecryptionRule>(args.resource),
        Family::Nat => schema_for::<NatRule>(args.resource),
    };

    let out = match global.output {
        OutputFormat::Table => {
            let mut table = Vec::new();
            rows(&schema.attributes, "", &mut table);
            format!("schema version {}\n{}", schema.version, output::render_table(&table))
        }
        OutputFormat::Plain => {
            let mut table = Vec::new();
            rows(&schema.attributes, "", &mut table);
            table.into_iter().map(|r| r.path).collect::<Vec<_>>().join("\n")
        }
        _ => output::render_single(&global.output, &schema, |_| String::new(), |_| String::new())?,
    };
    output::print_output(&out, global.quiet)?;
    Ok(())
}
