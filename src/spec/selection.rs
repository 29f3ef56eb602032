use apollo_compiler::executable;
use apollo_compiler::ExecutableDocument;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;

use crate::error::SpecError;
use crate::spec::FieldType;

/// One selection of a step's abstract selection tree: a field with an
/// optional alias, an inline fragment on a type condition, or a named
/// fragment spread.
///
/// Fragment spreads carry their resolved definition, captured when the tree
/// is built, so consumers never need the surrounding document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Field {
        name: ByteString,
        alias: Option<ByteString>,
        selection_set: Option<Vec<Selection>>,
        field_type: FieldType,
    },
    InlineFragment {
        type_condition: String,
        selection_set: Vec<Selection>,
    },
    FragmentSpread {
        name: String,
        type_condition: String,
        selection_set: Vec<Selection>,
    },
}

impl Selection {
    pub(crate) fn from_executable(
        selection: &executable::Selection,
        document: &ExecutableDocument,
    ) -> Result<Self, SpecError> {
        Ok(match selection {
            // Spec: https://spec.graphql.org/draft/#Field
            executable::Selection::Field(field) => {
                let selection_set = if field.selection_set.selections.is_empty() {
                    None
                } else {
                    Some(convert_selection_set(&field.selection_set, document)?)
                };

                Self::Field {
                    name: field.name.as_str().into(),
                    alias: field.alias.as_ref().map(|alias| alias.as_str().into()),
                    selection_set,
                    field_type: FieldType::from(field.ty()),
                }
            }
            // Spec: https://spec.graphql.org/draft/#InlineFragment
            executable::Selection::InlineFragment(inline_fragment) => {
                let type_condition = inline_fragment
                    .type_condition
                    .as_ref()
                    .map(|condition| condition.as_str())
                    .unwrap_or_else(|| inline_fragment.selection_set.ty.as_str())
                    .to_owned();

                Self::InlineFragment {
                    type_condition,
                    selection_set: convert_selection_set(
                        &inline_fragment.selection_set,
                        document,
                    )?,
                }
            }
            // Spec: https://spec.graphql.org/draft/#FragmentSpread
            executable::Selection::FragmentSpread(fragment_spread) => {
                let fragment = fragment_spread.fragment_def(document).ok_or_else(|| {
                    SpecError::UnknownFragment(fragment_spread.fragment_name.to_string())
                })?;

                Self::FragmentSpread {
                    name: fragment_spread.fragment_name.as_str().to_owned(),
                    type_condition: fragment.type_condition().as_str().to_owned(),
                    selection_set: convert_selection_set(&fragment.selection_set, document)?,
                }
            }
        })
    }

}

fn convert_selection_set(
    selection_set: &executable::SelectionSet,
    document: &ExecutableDocument,
) -> Result<Vec<Selection>, SpecError> {
    selection_set
        .selections
        .iter()
        .map(|selection| Selection::from_executable(selection, document))
        .collect()
}

/// Render a selection set to its single-line document form, e.g.
/// `{ _id: id name owner { _id: id } }`.
///
/// Fragment spreads render in their inline form since their definitions were
/// resolved when the tree was built.
pub(crate) fn render_selection_set(selection_set: &[Selection]) -> String {
    let mut out = String::new();
    write_selection_set(selection_set, &mut out);
    out
}

fn write_selection_set(selection_set: &[Selection], out: &mut String) {
    out.push('{');
    for selection in selection_set {
        out.push(' ');
        match selection {
            Selection::Field {
                name,
                alias,
                selection_set,
                ..
            } => {
                match alias {
                    Some(alias) if alias != name => {
                        out.push_str(alias.as_str());
                        out.push_str(": ");
                        out.push_str(name.as_str());
                    }
                    _ => out.push_str(name.as_str()),
                }
                if let Some(sub_selections) = selection_set {
                    out.push(' ');
                    write_selection_set(sub_selections, out);
                }
            }
            Selection::InlineFragment {
                type_condition,
                selection_set,
            }
            | Selection::FragmentSpread {
                type_condition,
                selection_set,
                ..
            } => {
                out.push_str("... on ");
                out.push_str(type_condition);
                out.push(' ');
                write_selection_set(selection_set, out);
            }
        }
    }
    out.push_str(" }");
}
