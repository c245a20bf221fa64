//! Module: db::filter
//! Responsibility: three-valued filter trees evaluated against object rows.
//! Does not own: filter optimization or index selection.
//! Boundary: attribute metadata comes from an injected `SchemaCache`; an
//! attribute the schema does not know is a fatal consistency failure.

mod syntax;

pub use syntax::SyntaxRegistry;

use crate::{
    db::store::{RowColumns, read_bytes_into},
    error::{ErrorClass, ErrorOrigin, InternalError},
    traits::{CompareOp, FilterEvaluator, SchemaCache},
    types::{ColumnId, Tribool},
};

///
/// FilterNode
///
/// Filter tree as the client expressed it. Assertion values are in their
/// external form until the tree is bound.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FilterNode {
    True,
    False,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Present { attribute: u32 },
    Compare {
        attribute: u32,
        op: CompareOp,
        value: Vec<u8>,
    },
}

///
/// BoundFilter
///
/// Filter tree with attribute syntaxes resolved and assertion values in
/// internal form.
///

pub struct BoundFilter<'a> {
    root: Bound,
    syntaxes: &'a SyntaxRegistry,
}

enum Bound {
    Constant(Tribool),
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Present {
        attribute: u32,
    },
    Compare {
        attribute: u32,
        syntax: u32,
        op: CompareOp,
        value: Vec<u8>,
    },
}

impl<'a> BoundFilter<'a> {
    pub fn bind(
        node: &FilterNode,
        schema: &dyn SchemaCache,
        syntaxes: &'a SyntaxRegistry,
    ) -> Result<Self, InternalError> {
        Ok(Self {
            root: bind_node(node, schema, syntaxes)?,
            syntaxes,
        })
    }

    fn eval(&self, node: &Bound, row: &mut dyn RowColumns, buf: &mut Vec<u8>) -> Result<Tribool, InternalError> {
        let result = match node {
            Bound::Constant(value) => *value,
            Bound::And(children) => {
                let mut acc = Tribool::True;
                for child in children {
                    acc = acc.and(self.eval(child, row, buf)?);
                    if acc == Tribool::False {
                        break;
                    }
                }
                acc
            }
            Bound::Or(children) => {
                let mut acc = Tribool::False;
                for child in children {
                    acc = acc.or(self.eval(child, row, buf)?);
                    if acc == Tribool::True {
                        break;
                    }
                }
                acc
            }
            Bound::Not(child) => self.eval(child, row, buf)?.not(),
            Bound::Present { attribute } => Tribool::from_bool(read_attribute(row, *attribute, buf)?),
            Bound::Compare {
                attribute,
                syntax,
                op,
                value,
            } => {
                if !read_attribute(row, *attribute, buf)? {
                    return Ok(Tribool::False);
                }
                let Some(handler) = self.syntaxes.get(*syntax) else {
                    return Err(unknown_syntax(*syntax));
                };

                handler.eval(*op, buf, value)
            }
        };

        Ok(result)
    }
}

impl FilterEvaluator for BoundFilter<'_> {
    fn evaluate(&self, row: &mut dyn RowColumns) -> Result<Tribool, InternalError> {
        let mut buf = Vec::with_capacity(64);
        self.eval(&self.root, row, &mut buf)
    }
}

fn read_attribute(row: &mut dyn RowColumns, attribute: u32, buf: &mut Vec<u8>) -> Result<bool, InternalError> {
    read_bytes_into(buf, |out| row.retrieve_column(ColumnId::Attribute(attribute), out))
}

fn unknown_syntax(syntax: u32) -> InternalError {
    InternalError::new(
        ErrorClass::Corruption,
        ErrorOrigin::Search,
        format!("schema references unknown attribute syntax {syntax}"),
    )
}

fn bind_node(
    node: &FilterNode,
    schema: &dyn SchemaCache,
    syntaxes: &SyntaxRegistry,
) -> Result<Bound, InternalError> {
    let bind_all = |children: &[FilterNode]| {
        children
            .iter()
            .map(|child| bind_node(child, schema, syntaxes))
            .collect::<Result<Vec<_>, _>>()
    };

    Ok(match node {
        FilterNode::True => Bound::Constant(Tribool::True),
        FilterNode::False => Bound::Constant(Tribool::False),
        FilterNode::And(children) => Bound::And(bind_all(children)?),
        FilterNode::Or(children) => Bound::Or(bind_all(children)?),
        FilterNode::Not(child) => Bound::Not(Box::new(bind_node(child, schema, syntaxes)?)),
        FilterNode::Present { attribute } => {
            lookup(schema, *attribute)?;
            Bound::Present {
                attribute: *attribute,
            }
        }
        FilterNode::Compare {
            attribute,
            op,
            value,
        } => {
            let syntax = lookup(schema, *attribute)?;
            let handler = syntaxes.get(syntax).ok_or_else(|| unknown_syntax(syntax))?;

            Bound::Compare {
                attribute: *attribute,
                syntax,
                op: *op,
                value: handler.external_to_internal(value)?,
            }
        }
    })
}

fn lookup(schema: &dyn SchemaCache, attribute: u32) -> Result<u32, InternalError> {
    schema
        .attribute_by_id(attribute)
        .map(|desc| desc.syntax)
        .ok_or_else(|| {
            InternalError::new(
                ErrorClass::Corruption,
                ErrorOrigin::Search,
                format!("filter names attribute {attribute} missing from the schema cache"),
            )
        })
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::store::ColumnRead, error::StoreError, traits::AttributeDescriptor};
    use std::collections::BTreeMap;

    const NAME: u32 = 10;
    const AGE: u32 = 11;

    struct Schema;

    impl SchemaCache for Schema {
        fn attribute_by_id(&self, id: u32) -> Option<AttributeDescriptor> {
            let syntax = match id {
                NAME => SyntaxRegistry::CASE_IGNORE_STRING,
                AGE => SyntaxRegistry::INTEGER,
                _ => return None,
            };

            Some(AttributeDescriptor {
                id,
                name: format!("attr{id}"),
                syntax,
                multi_valued: false,
            })
        }
    }

    struct Row(BTreeMap<u32, Vec<u8>>);

    impl RowColumns for Row {
        fn retrieve_column(
            &mut self,
            column: ColumnId,
            buf: &mut [u8],
        ) -> Result<ColumnRead, StoreError> {
            let ColumnId::Attribute(id) = column else {
                return Ok(ColumnRead::Null);
            };
            let Some(value) = self.0.get(&id) else {
                return Ok(ColumnRead::Null);
            };
            if buf.len() < value.len() {
                return Ok(ColumnRead::Truncated {
                    required: value.len(),
                });
            }
            buf[..value.len()].copy_from_slice(value);
            Ok(ColumnRead::Value(value.len()))
        }
    }

    fn row() -> Row {
        Row(BTreeMap::from([
            (NAME, b"alice".to_vec()),
            (AGE, 41i64.to_le_bytes().to_vec()),
        ]))
    }

    fn eval(node: &FilterNode) -> Tribool {
        let syntaxes = SyntaxRegistry::with_builtin();
        let filter = BoundFilter::bind(node, &Schema, &syntaxes).expect("bind");
        filter.evaluate(&mut row()).expect("evaluate")
    }

    #[test]
    fn comparisons_use_the_attribute_syntax() {
        assert_eq!(
            eval(&FilterNode::Compare {
                attribute: NAME,
                op: CompareOp::Eq,
                value: b"ALICE".to_vec(),
            }),
            Tribool::True
        );
        assert_eq!(
            eval(&FilterNode::Compare {
                attribute: AGE,
                op: CompareOp::Gt,
                value: b"50".to_vec(),
            }),
            Tribool::False
        );
    }

    #[test]
    fn boolean_nodes_follow_three_valued_logic() {
        let missing_age = FilterNode::Not(Box::new(FilterNode::Present { attribute: AGE }));
        assert_eq!(eval(&missing_age), Tribool::False);

        let either = FilterNode::Or(vec![FilterNode::False, FilterNode::Present { attribute: NAME }]);
        assert_eq!(eval(&either), Tribool::True);

        let both = FilterNode::And(vec![FilterNode::True, FilterNode::False]);
        assert_eq!(eval(&both), Tribool::False);
    }

    #[test]
    fn unknown_attribute_fails_binding() {
        let syntaxes = SyntaxRegistry::with_builtin();
        let err = BoundFilter::bind(&FilterNode::Present { attribute: 999 }, &Schema, &syntaxes)
            .err()
            .expect("binding should fail");

        assert_eq!(err.class, ErrorClass::Corruption);
    }
}
