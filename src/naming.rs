//! Milestone naming.
//!
//! The placer only sees the [`NameFn`] trait. [`NameTemplate`] is the bundled
//! implementation: literal text with `{var}` / `{var:spec}` placeholders.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `num` | 1-based milestone number |
//! | `total` | Number of milestones on the route |
//! | `dist` | Along-route distance in meters |
//! | `km` | Along-route distance in kilometers |
//! | `lat`, `lon` | Coordinates of the milestone |
//! | `elev` | Elevation of the milestone (empty when unknown) |
//!
//! A spec is an optional `0` flag, a width and, for the float variables, a
//! `.precision`: `{num:02}`, `{km:.1}`, `{dist:08.2}`. Literal braces are written
//! `{{` and `}}`.

use std::fmt;

/// Values available to a name function for one milestone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameVariables {
    pub number: usize,
    pub total: usize,
    /// Along-route distance in meters
    pub distance: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl NameVariables {
    /// Data-independent values used to validate a name function up front.
    pub fn placeholder() -> Self {
        Self {
            number: 1,
            total: 1,
            distance: 0.0,
            latitude: 0.0,
            longitude: 0.0,
            elevation: Some(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NameError {
    #[error("Unclosed placeholder at byte {0}")]
    Unclosed(usize),

    #[error("Unmatched '}}' at byte {0}")]
    UnmatchedBrace(usize),

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Invalid format spec '{0}'")]
    InvalidSpec(String),

    #[error("{0}")]
    Custom(String),
}

/// Produces the name of a milestone from its variables.
pub trait NameFn: Send + Sync {
    fn name(&self, vars: &NameVariables) -> Result<String, NameError>;

    /// Evaluate once against [`NameVariables::placeholder`].
    fn validate(&self) -> Result<(), NameError> {
        self.name(&NameVariables::placeholder()).map(|_| ())
    }
}

impl<F> NameFn for F
where
    F: Fn(&NameVariables) -> Result<String, NameError> + Send + Sync,
{
    fn name(&self, vars: &NameVariables) -> Result<String, NameError> {
        self(vars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    Number,
    Total,
    Distance,
    Kilometer,
    Latitude,
    Longitude,
    Elevation,
}

impl Var {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "num" => Some(Var::Number),
            "total" => Some(Var::Total),
            "dist" => Some(Var::Distance),
            "km" => Some(Var::Kilometer),
            "lat" => Some(Var::Latitude),
            "lon" => Some(Var::Longitude),
            "elev" => Some(Var::Elevation),
            _ => None,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Var::Number | Var::Total)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Literal(String),
    Field {
        var: Var,
        zero: bool,
        width: usize,
        precision: Option<usize>,
    },
}

/// A parsed placeholder template.
///
/// # Example
/// ```
/// use track_milestones::{NameFn, NameTemplate, NameVariables};
///
/// let template = NameTemplate::parse("SM400 {num:02}/{total}").unwrap();
/// let vars = NameVariables { number: 1, total: 10, ..NameVariables::placeholder() };
/// assert_eq!(template.name(&vars).unwrap(), "SM400 01/10");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NameTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl NameTemplate {
    pub const DEFAULT: &'static str = "{km:.1}K";

    pub fn parse(template: &str) -> Result<Self, NameError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    let mut field = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        field.push(c);
                    }
                    if !closed {
                        return Err(NameError::Unclosed(i));
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(parse_field(&field)?);
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(NameError::UnmatchedBrace(i));
                    }
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            pieces,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Default for NameTemplate {
    /// `{km:.1}K`
    fn default() -> Self {
        Self {
            source: Self::DEFAULT.to_string(),
            pieces: vec![
                Piece::Field {
                    var: Var::Kilometer,
                    zero: false,
                    width: 0,
                    precision: Some(1),
                },
                Piece::Literal("K".to_string()),
            ],
        }
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl NameFn for NameTemplate {
    fn name(&self, vars: &NameVariables) -> Result<String, NameError> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field {
                    var,
                    zero,
                    width,
                    precision,
                } => out.push_str(&render(*var, *zero, *width, *precision, vars)),
            }
        }
        Ok(out)
    }
}

fn parse_field(field: &str) -> Result<Piece, NameError> {
    let (name, spec) = match field.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec)),
        None => (field.trim(), None),
    };
    let var = Var::parse(name).ok_or_else(|| NameError::UnknownVariable(name.to_string()))?;

    let Some(spec) = spec else {
        return Ok(Piece::Field {
            var,
            zero: false,
            width: 0,
            precision: None,
        });
    };

    let invalid = || NameError::InvalidSpec(spec.to_string());
    let (width_part, precision_part) = match spec.split_once('.') {
        Some((w, p)) => (w, Some(p)),
        None => (spec, None),
    };
    let (zero, width_digits) = match width_part.strip_prefix('0') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, width_part),
    };
    let width = if width_digits.is_empty() {
        0
    } else {
        width_digits.parse::<usize>().map_err(|_| invalid())?
    };
    let precision = match precision_part {
        Some(p) => Some(p.parse::<usize>().map_err(|_| invalid())?),
        None => None,
    };
    if precision.is_some() && var.is_integer() {
        return Err(invalid());
    }

    Ok(Piece::Field {
        var,
        zero,
        width,
        precision,
    })
}

fn render(var: Var, zero: bool, width: usize, precision: Option<usize>, vars: &NameVariables) -> String {
    let value = match var {
        Var::Number => return pad_integer(vars.number, zero, width),
        Var::Total => return pad_integer(vars.total, zero, width),
        Var::Distance => vars.distance,
        Var::Kilometer => vars.distance / 1000.0,
        Var::Latitude => vars.latitude,
        Var::Longitude => vars.longitude,
        Var::Elevation => match vars.elevation {
            Some(e) => e,
            None => return String::new(),
        },
    };
    match (zero, precision) {
        (true, Some(p)) => format!("{:0w$.p$}", value, w = width, p = p),
        (true, None) => format!("{:0w$}", value, w = width),
        (false, Some(p)) => format!("{:w$.p$}", value, w = width, p = p),
        (false, None) => format!("{:w$}", value, w = width),
    }
}

fn pad_integer(value: usize, zero: bool, width: usize) -> String {
    if zero {
        format!("{:0w$}", value, w = width)
    } else {
        format!("{:w$}", value, w = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> NameVariables {
        NameVariables {
            number: 1,
            total: 10,
            distance: 100.0,
            latitude: 25.1707179,
            longitude: 121.5534371,
            elevation: None,
        }
    }

    fn eval(template: &str) -> String {
        NameTemplate::parse(template).unwrap().name(&vars()).unwrap()
    }

    #[test]
    fn test_kilometer_template() {
        assert_eq!(eval("{km:.1}K"), "0.1K");
    }

    #[test]
    fn test_meter_template() {
        assert_eq!(eval("{dist:.0}m"), "100m");
    }

    #[test]
    fn test_numbered_template() {
        assert_eq!(eval("SM400 {num:02}/{total}"), "SM400 01/10");
    }

    #[test]
    fn test_coordinates_and_missing_elevation() {
        assert_eq!(eval("{lat:.3},{lon:.3} [{elev}]"), "25.171,121.553 []");
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(eval("{{num}} = {num}"), "{num} = 1");
        assert_eq!(eval("}}"), "}");
    }

    #[test]
    fn test_default_template() {
        let template = NameTemplate::default();
        assert_eq!(template.source(), "{km:.1}K");
        assert_eq!(template, NameTemplate::parse(NameTemplate::DEFAULT).unwrap());
        assert_eq!(template.name(&vars()).unwrap(), "0.1K");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            NameTemplate::parse("{foo}"),
            Err(NameError::UnknownVariable("foo".to_string()))
        );
        assert_eq!(NameTemplate::parse("km {num"), Err(NameError::Unclosed(3)));
        assert_eq!(NameTemplate::parse("a}b"), Err(NameError::UnmatchedBrace(1)));
        assert_eq!(
            NameTemplate::parse("{num:.2}"),
            Err(NameError::InvalidSpec(".2".to_string()))
        );
        assert_eq!(
            NameTemplate::parse("{dist:x}"),
            Err(NameError::InvalidSpec("x".to_string()))
        );
    }

    #[test]
    fn test_closure_name_fn() {
        let namer = |v: &NameVariables| -> Result<String, NameError> {
            Ok(format!("#{}", v.number))
        };
        assert_eq!(namer.name(&vars()).unwrap(), "#1");
        assert!(namer.validate().is_ok());
    }

    #[test]
    fn test_failing_name_fn_fails_validation() {
        let namer = |_: &NameVariables| -> Result<String, NameError> {
            Err(NameError::Custom("no names today".to_string()))
        };
        assert_eq!(
            namer.validate(),
            Err(NameError::Custom("no names today".to_string()))
        );
    }
}
