//! The exchange value both marshaling directions meet in.

use crate::error::BridgeError;
use crate::host::HostRef;
use crate::object::ScriptObject;

/// A value crossing the host/script boundary.
///
/// Script `undefined` maps to [`HostValue::Void`] and `null` to
/// [`HostValue::Null`]; the two stay distinguishable in both directions.
/// Numbers split on the integral rule: a script number that is integral and
/// exactly representable as `i64` becomes `Int`, everything else `Float`.
#[derive(Debug, Clone)]
pub enum HostValue {
    /// Script `undefined` / "no value"
    Void,
    /// Script `null`
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A host object (possibly coming back after a round trip)
    Object(HostRef),
    /// A script object wrapped for the host
    Script(ScriptObject),
}

impl HostValue {
    /// Classify an engine number per the integral rule.
    pub fn from_number(n: f64) -> Self {
        // 2^63, the smallest integral f64 that no longer fits an i64. The
        // bound must be exclusive: `i64::MAX as f64` rounds up to exactly
        // this value, so an inclusive check would let 2^63 saturate.
        const I64_END: f64 = 9_223_372_036_854_775_808.0;
        if n.is_finite() && n.fract() == 0.0 && n >= -I64_END && n < I64_END {
            Self::Int(n as i64)
        } else {
            Self::Float(n)
        }
    }

    /// Wrap a host object
    pub fn object(host: impl Into<HostRef>) -> Self {
        Self::Object(host.into())
    }

    /// Truthiness with script semantics: `Void`, `Null`, `false`, `0`,
    /// `NaN` and the empty string are falsy, everything else truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Void | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Object(_) | Self::Script(_) => true,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptObject> {
        match self {
            Self::Script(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<&HostRef> {
        match self {
            Self::Object(h) => Some(h),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    /// Structural equality, with two twists: `Int`/`Float` compare
    /// numerically across variants, and `Object`/`Script` compare by
    /// identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) => true,
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Script(a), Self::Script(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<ScriptObject> for HostValue {
    fn from(o: ScriptObject) -> Self {
        Self::Script(o)
    }
}

/// The script `null` value as a guarded host-side singleton.
///
/// Mirrors engines where `null` is a distinguished object: there is exactly
/// one instance, obtained through [`Null::instance`], and constructing a
/// second one is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Null {
    _guard: (),
}

static NULL_INSTANCE: Null = Null { _guard: () };

impl Null {
    /// The shared instance.
    pub fn instance() -> &'static Null {
        &NULL_INSTANCE
    }

    /// Always fails; `null` cannot be instantiated.
    pub fn new() -> Result<Null, BridgeError> {
        Err(BridgeError::type_mismatch("cannot create 'Null' instances"))
    }

    pub fn to_value(&self) -> HostValue {
        HostValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_number_integral() {
        assert_eq!(HostValue::from_number(5.0), HostValue::Int(5));
        assert_eq!(HostValue::from_number(-3.0), HostValue::Int(-3));
        assert_eq!(HostValue::from_number(0.0), HostValue::Int(0));
    }

    #[test]
    fn test_from_number_fractional() {
        assert!(matches!(HostValue::from_number(3.34), HostValue::Float(_)));
        assert!(matches!(
            HostValue::from_number(f64::NAN),
            HostValue::Float(_)
        ));
        assert!(matches!(
            HostValue::from_number(f64::INFINITY),
            HostValue::Float(_)
        ));
        // Integral but not exactly representable as i64
        assert!(matches!(HostValue::from_number(1e300), HostValue::Float(_)));
    }

    #[test]
    fn test_from_number_i64_boundary() {
        assert_eq!(
            HostValue::from_number(-9_223_372_036_854_775_808.0),
            HostValue::Int(i64::MIN)
        );
        // 2^63 overflows i64 and must not saturate to i64::MAX
        assert!(matches!(
            HostValue::from_number(9_223_372_036_854_775_808.0),
            HostValue::Float(_)
        ));
        // The largest integral f64 below 2^63 still converts exactly
        assert_eq!(
            HostValue::from_number(9_223_372_036_854_774_784.0),
            HostValue::Int(9_223_372_036_854_774_784)
        );
    }

    #[test]
    fn test_cross_variant_numeric_eq() {
        assert_eq!(HostValue::Int(5), HostValue::Float(5.0));
        assert_ne!(HostValue::Int(5), HostValue::Float(5.5));
        assert_ne!(HostValue::Int(1), HostValue::Bool(true));
    }

    #[test]
    fn test_truthiness() {
        assert!(!HostValue::Void.is_truthy());
        assert!(!HostValue::Null.is_truthy());
        assert!(!HostValue::Int(0).is_truthy());
        assert!(!HostValue::Float(f64::NAN).is_truthy());
        assert!(!HostValue::Str(String::new()).is_truthy());
        assert!(HostValue::Str("x".into()).is_truthy());
        assert!(HostValue::Int(-1).is_truthy());
    }

    #[test]
    fn test_null_singleton() {
        let a = Null::instance();
        let b = Null::instance();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.to_value(), HostValue::Null);
        assert!(Null::new().is_err());
    }
}
