//! Whitelisted functions reachable from rate expressions
//!
//! Nothing outside this catalog can be called. The kinetic helpers follow the
//! usual enzyme-kinetics conventions: `S` substrate, `I` inhibitor, `Vmax`
//! maximal velocity, `Km` Michaelis constant, `Ki` inhibition constant.

use std::fmt;

/// A catalog function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Exp,
    Ln,
    Log,
    Log10,
    Sqrt,
    Pow,
    Floor,
    Ceil,
    Min,
    Max,
    /// `Vmax·S/(Km+S)`
    MichaelisMenten,
    /// `Vmax·S/(Km·(1+I/Ki)+S)`
    CompetitiveInhibition,
    /// `Vmax·S/(Km+S·(1+I/Ki))`
    UncompetitiveInhibition,
    /// `Vmax·S/((Km+S)·(1+I/Ki))`
    NoncompetitiveInhibition,
    /// `Vmax·S^n/(K^n+S^n)`
    Hill,
    /// `k·X1·...·Xn`
    MassAction,
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    /// Check an argument count
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::Range(lo, hi) => write!(f, "{} to {}", lo, hi),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

impl Function {
    /// Look up a function by name
    pub fn lookup(name: &str) -> Option<Self> {
        let function = match name {
            "abs" => Function::Abs,
            "exp" => Function::Exp,
            "ln" => Function::Ln,
            "log" => Function::Log,
            "log10" => Function::Log10,
            "sqrt" => Function::Sqrt,
            "pow" => Function::Pow,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "min" => Function::Min,
            "max" => Function::Max,
            "michaelis_menten" | "mm" => Function::MichaelisMenten,
            "competitive_inhibition" => Function::CompetitiveInhibition,
            "uncompetitive_inhibition" => Function::UncompetitiveInhibition,
            "noncompetitive_inhibition" => Function::NoncompetitiveInhibition,
            "hill" => Function::Hill,
            "mass_action" => Function::MassAction,
            _ => return None,
        };
        Some(function)
    }

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log => "log",
            Function::Log10 => "log10",
            Function::Sqrt => "sqrt",
            Function::Pow => "pow",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Min => "min",
            Function::Max => "max",
            Function::MichaelisMenten => "michaelis_menten",
            Function::CompetitiveInhibition => "competitive_inhibition",
            Function::UncompetitiveInhibition => "uncompetitive_inhibition",
            Function::NoncompetitiveInhibition => "noncompetitive_inhibition",
            Function::Hill => "hill",
            Function::MassAction => "mass_action",
        }
    }

    /// Accepted argument counts
    pub fn arity(self) -> Arity {
        match self {
            Function::Abs
            | Function::Exp
            | Function::Ln
            | Function::Log10
            | Function::Sqrt
            | Function::Floor
            | Function::Ceil => Arity::Exactly(1),
            Function::Log => Arity::Range(1, 2),
            Function::Pow => Arity::Exactly(2),
            Function::Min | Function::Max | Function::MassAction => Arity::AtLeast(1),
            Function::MichaelisMenten => Arity::Exactly(3),
            Function::CompetitiveInhibition
            | Function::UncompetitiveInhibition
            | Function::NoncompetitiveInhibition => Arity::Exactly(5),
            Function::Hill => Arity::Exactly(4),
        }
    }

    /// Apply to already evaluated arguments
    ///
    /// Arity has been checked at compile time. Domain errors surface as
    /// non-finite results, which the evaluator rejects.
    pub fn apply(self, args: &[f64]) -> Result<f64, String> {
        let arg = |i: usize| args.get(i).copied().unwrap_or(f64::NAN);
        let value = match self {
            Function::Abs => arg(0).abs(),
            Function::Exp => arg(0).exp(),
            Function::Ln => arg(0).ln(),
            Function::Log if args.len() == 2 => arg(0).ln() / arg(1).ln(),
            Function::Log => arg(0).ln(),
            Function::Log10 => arg(0).log10(),
            Function::Sqrt => arg(0).sqrt(),
            Function::Pow => arg(0).powf(arg(1)),
            Function::Floor => arg(0).floor(),
            Function::Ceil => arg(0).ceil(),
            Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Function::MichaelisMenten => {
                let (s, vmax, km) = (arg(0), arg(1), arg(2));
                ratio(vmax * s, km + s)?
            }
            Function::CompetitiveInhibition => {
                let (s, i, vmax, km, ki) = (arg(0), arg(1), arg(2), arg(3), arg(4));
                let factor = 1.0 + ratio(i, ki)?;
                ratio(vmax * s, km * factor + s)?
            }
            Function::UncompetitiveInhibition => {
                let (s, i, vmax, km, ki) = (arg(0), arg(1), arg(2), arg(3), arg(4));
                let factor = 1.0 + ratio(i, ki)?;
                ratio(vmax * s, km + s * factor)?
            }
            Function::NoncompetitiveInhibition => {
                let (s, i, vmax, km, ki) = (arg(0), arg(1), arg(2), arg(3), arg(4));
                let factor = 1.0 + ratio(i, ki)?;
                ratio(vmax * s, (km + s) * factor)?
            }
            Function::Hill => {
                let (s, vmax, k, n) = (arg(0), arg(1), arg(2), arg(3));
                let sn = s.powf(n);
                ratio(vmax * sn, k.powf(n) + sn)?
            }
            Function::MassAction => args.iter().product(),
        };
        Ok(value)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn ratio(numerator: f64, denominator: f64) -> Result<f64, String> {
    if denominator == 0.0 {
        if numerator == 0.0 {
            // 0/0 at an empty substrate pool is a zero rate
            return Ok(0.0);
        }
        return Err("division by zero".to_string());
    }
    Ok(numerator / denominator)
}
