use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// FOLD-style crease assignment. Decides which way a crease folds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Assignment {
    M,
    V,
    F,
    B,
}

impl Assignment {
    /// Applies this assignment's sign convention to a target fold angle:
    /// mountains fold to negative angles, valleys to positive ones, and flat
    /// or boundary creases stay at zero.
    pub fn signed_target(&self, magnitude: f64) -> f64 {
        match *self {
            Assignment::M => -magnitude.abs(),
            Assignment::V => magnitude.abs(),
            Assignment::F | Assignment::B => 0.0,
        }
    }
}

impl FromStr for Assignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Assignment, String> {
        match s {
            "M" => Ok(Assignment::M),
            "V" => Ok(Assignment::V),
            "F" => Ok(Assignment::F),
            "B" => Ok(Assignment::B),
            _ => Err(format!("unknown crease assignment `{}`", s)),
        }
    }
}

impl TryFrom<String> for Assignment {
    type Error = String;

    fn try_from(s: String) -> Result<Assignment, String> {
        s.parse()
    }
}

impl From<Assignment> for String {
    fn from(assignment: Assignment) -> String {
        assignment.to_string()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Assignment::M => "M",
            Assignment::V => "V",
            Assignment::F => "F",
            Assignment::B => "B",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_convention() {
        assert_eq!(Assignment::M.signed_target(1.5), -1.5);
        assert_eq!(Assignment::M.signed_target(-1.5), -1.5);
        assert_eq!(Assignment::V.signed_target(-0.5), 0.5);
        assert_eq!(Assignment::F.signed_target(2.0), 0.0);
        assert_eq!(Assignment::B.signed_target(2.0), 0.0);
    }

    #[test]
    fn parses_fold_letters() {
        assert_eq!("V".parse::<Assignment>(), Ok(Assignment::V));
        assert!("valley".parse::<Assignment>().is_err());

        let parsed: Vec<Assignment> = serde_json::from_str(r#"["M", "V", "B"]"#).unwrap();
        assert_eq!(parsed, vec![Assignment::M, Assignment::V, Assignment::B]);
        assert!(serde_json::from_str::<Assignment>(r#""X""#).is_err());
    }
}
