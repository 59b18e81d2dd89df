use crate::substitution::character::CharacterMatrix;
use crate::substitution::rate_matrix::RateMatrix;
use crate::tree::topology::Tree;

/// A closed tag set for everything a DagNode can carry. RevBayes uses a
/// `TypedDagNode<valueType>` class template specialized per semantic type;
/// here that collapses to a tagged variant with dispatch methods, per the
/// "template specialization over value types" design note.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    RealVector(Vec<f64>),
    Simplex(Vec<f64>),
    Tree(Tree),
    RateMatrix(RateMatrix),
    CharacterMatrix(CharacterMatrix),
}

impl crate::Arbitrary for Value {
    /// a random `Real` in `[-10, 10)`, for test fixtures that only need
    /// "some value", not a specific one.
    fn random() -> Self {
        use rand::Rng;
        Value::Real(rand::rng().random_range(-10.0..10.0))
    }
}

impl Value {
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(*x),
            Value::Integer(x) => Some(*x as f64),
            _ => None,
        }
    }
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(x) => Some(*x),
            _ => None,
        }
    }
    pub fn as_real_vector(&self) -> Option<&[f64]> {
        match self {
            Value::RealVector(v) => Some(v),
            Value::Simplex(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_simplex(&self) -> Option<&[f64]> {
        match self {
            Value::Simplex(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Value::Tree(t) => Some(t),
            _ => None,
        }
    }
    pub fn as_tree_mut(&mut self) -> Option<&mut Tree> {
        match self {
            Value::Tree(t) => Some(t),
            _ => None,
        }
    }
    pub fn as_rate_matrix(&self) -> Option<&RateMatrix> {
        match self {
            Value::RateMatrix(r) => Some(r),
            _ => None,
        }
    }
    pub fn as_character_matrix(&self) -> Option<&CharacterMatrix> {
        match self {
            Value::CharacterMatrix(c) => Some(c),
            _ => None,
        }
    }

    /// is a vector-shaped tag whose `printName`/`printValue` flatten into
    /// `name[1] sep name[2] …` when requested (§6).
    pub fn is_vector_shaped(&self) -> bool {
        matches!(self, Value::RealVector(_) | Value::Simplex(_))
    }

    /// `printName` per §6: emits `name` or, for vector-shaped values with
    /// `flatten`, `name[1] sep name[2] …`.
    pub fn print_name(&self, name: &str, sep: &str, flatten: bool) -> String {
        if self.is_vector_shaped() && flatten {
            let n = self.as_real_vector().map(|v| v.len()).unwrap_or(0);
            (1..=n)
                .map(|i| format!("{name}[{i}]"))
                .collect::<Vec<_>>()
                .join(sep)
        } else {
            name.to_string()
        }
    }

    /// `printValue` per §6. For `Real`, `simple=false` uses the maximum
    /// printable precision; otherwise a default (here: 6 significant
    /// digits, matching RevBayes's default `RbSettings` output precision).
    /// Integer/string-shaped values ignore the precision flags.
    pub fn print_value(&self, sep: &str, simple: bool, flatten: bool) -> String {
        match self {
            Value::Real(x) => {
                if simple {
                    format!("{x:.6}")
                } else {
                    format!("{x:.17}")
                }
            }
            Value::Integer(x) => format!("{x}"),
            Value::RealVector(v) | Value::Simplex(v) => {
                if flatten {
                    v.iter()
                        .map(|x| {
                            if simple {
                                format!("{x:.6}")
                            } else {
                                format!("{x:.17}")
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(sep)
                } else {
                    format!("{v:?}")
                }
            }
            Value::Tree(t) => t.to_newick(),
            Value::RateMatrix(_) => "<rate-matrix>".to_string(),
            Value::CharacterMatrix(_) => "<character-matrix>".to_string(),
        }
    }
}
