// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! The complete set of callable functions. Names match those used by saved plot settings
//! (`log10`, `arctan2`, `power`, ...); common aliases are accepted as well.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log10,
    Log2,
    Log1p,
    Expm1,
    Sqrt,
    Abs,
    Floor,
    Ceil,
    Round,
    Sign,
    Pow,
    Hypot,
    Min,
    Max,
    Deg2Rad,
    Rad2Deg,
    IsNan,
    IsFinite,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        let builtin = match name {
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "arcsin" | "asin" => Builtin::Asin,
            "arccos" | "acos" => Builtin::Acos,
            "arctan" | "atan" => Builtin::Atan,
            "arctan2" | "atan2" => Builtin::Atan2,
            "sinh" => Builtin::Sinh,
            "cosh" => Builtin::Cosh,
            "tanh" => Builtin::Tanh,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            "log10" => Builtin::Log10,
            "log2" => Builtin::Log2,
            "log1p" => Builtin::Log1p,
            "expm1" => Builtin::Expm1,
            "sqrt" => Builtin::Sqrt,
            "abs" | "fabs" | "absolute" => Builtin::Abs,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            "sign" => Builtin::Sign,
            "power" | "pow" => Builtin::Pow,
            "hypot" => Builtin::Hypot,
            "min" | "minimum" => Builtin::Min,
            "max" | "maximum" => Builtin::Max,
            "deg2rad" | "radians" => Builtin::Deg2Rad,
            "rad2deg" | "degrees" => Builtin::Rad2Deg,
            "isnan" => Builtin::IsNan,
            "isfinite" => Builtin::IsFinite,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Atan2 | Builtin::Pow | Builtin::Hypot | Builtin::Min | Builtin::Max => 2,
            _ => 1,
        }
    }

    /// Predicates produce booleans, everything else a number.
    pub fn is_predicate(self) -> bool {
        matches!(self, Builtin::IsNan | Builtin::IsFinite)
    }

    pub fn apply1(self, x: f64) -> f64 {
        match self {
            Builtin::Sin => x.sin(),
            Builtin::Cos => x.cos(),
            Builtin::Tan => x.tan(),
            Builtin::Asin => x.asin(),
            Builtin::Acos => x.acos(),
            Builtin::Atan => x.atan(),
            Builtin::Sinh => x.sinh(),
            Builtin::Cosh => x.cosh(),
            Builtin::Tanh => x.tanh(),
            Builtin::Exp => x.exp(),
            Builtin::Log => x.ln(),
            Builtin::Log10 => x.log10(),
            Builtin::Log2 => x.log2(),
            Builtin::Log1p => x.ln_1p(),
            Builtin::Expm1 => x.exp_m1(),
            Builtin::Sqrt => x.sqrt(),
            Builtin::Abs => x.abs(),
            Builtin::Floor => x.floor(),
            Builtin::Ceil => x.ceil(),
            Builtin::Round => round_half_even(x),
            Builtin::Sign => {
                if x.is_nan() || x == 0.0 {
                    x
                } else {
                    x.signum()
                }
            }
            Builtin::Deg2Rad => x.to_radians(),
            Builtin::Rad2Deg => x.to_degrees(),
            Builtin::IsNan => f64::from(u8::from(x.is_nan())),
            Builtin::IsFinite => f64::from(u8::from(x.is_finite())),
            Builtin::Atan2 | Builtin::Pow | Builtin::Hypot | Builtin::Min | Builtin::Max => {
                f64::NAN
            }
        }
    }

    pub fn apply2(self, a: f64, b: f64) -> f64 {
        match self {
            Builtin::Atan2 => a.atan2(b),
            Builtin::Pow => a.powf(b),
            Builtin::Hypot => a.hypot(b),
            // min/max propagate NaN
            Builtin::Min => {
                if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    a.min(b)
                }
            }
            Builtin::Max => {
                if a.is_nan() || b.is_nan() {
                    f64::NAN
                } else {
                    a.max(b)
                }
            }
            _ => f64::NAN,
        }
    }
}

/// Named constants, consulted after table fields.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "nan" | "NaN" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}
