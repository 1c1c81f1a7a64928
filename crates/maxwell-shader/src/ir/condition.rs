use core::fmt;

use crate::error::{Error, Result};
use crate::ir::reg::Pred;

/// Source-ISA flow test codes attached to branch-like instructions.
///
/// Only the tests the translator lowers are listed; the remaining encodings
/// decode to their own variants so the emitter can report them precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowTest {
    T,
    F,
    Eq,
    Ne,
    Lt,
    Gt,
    Ge,
    Le,
}

impl FlowTest {
    pub fn from_raw(raw: u32) -> Result<FlowTest> {
        match raw {
            0x0f => Ok(FlowTest::T),
            0x00 => Ok(FlowTest::F),
            0x02 => Ok(FlowTest::Eq),
            0x0d => Ok(FlowTest::Ne),
            0x01 => Ok(FlowTest::Lt),
            0x04 => Ok(FlowTest::Gt),
            0x06 => Ok(FlowTest::Ge),
            0x03 => Ok(FlowTest::Le),
            other => Err(Error::invalid_argument(format!(
                "unknown flow test encoding {other:#x}"
            ))),
        }
    }
}

impl fmt::Display for FlowTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowTest::T => "T",
            FlowTest::F => "F",
            FlowTest::Eq => "EQ",
            FlowTest::Ne => "NE",
            FlowTest::Lt => "LT",
            FlowTest::Gt => "GT",
            FlowTest::Ge => "GE",
            FlowTest::Le => "LE",
        };
        write!(f, "{name}")
    }
}

/// A branch condition: a predicate (possibly negated) combined with a flow
/// test over the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub flow_test: FlowTest,
    pub pred: Pred,
    pub pred_negated: bool,
}

impl Condition {
    pub fn always() -> Condition {
        Condition {
            flow_test: FlowTest::T,
            pred: Pred::PT,
            pred_negated: false,
        }
    }

    pub fn new(flow_test: FlowTest, pred: Pred, pred_negated: bool) -> Condition {
        Condition {
            flow_test,
            pred,
            pred_negated,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pred_negated {
            write!(f, "!{}&{}", self.pred, self.flow_test)
        } else {
            write!(f, "{}&{}", self.pred, self.flow_test)
        }
    }
}
