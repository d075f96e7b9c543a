//! The phase abstraction.
//!
//! Every pipeline stage is a [`Phase`]: a pure transformation from one
//! artifact to the next that either completes or fails with a
//! [`CompileError`]. Stages compose with [`Chain`], so the whole backend is
//! one value whose `run` drives parsing output all the way to IR.

use crate::error::CompileError;

/// A single compilation stage.
pub trait Phase {
    type Input;
    type Output;

    /// Human-readable stage name, used for logging.
    fn name(&self) -> &'static str;

    /// Transform the input artifact, or fail with the first error.
    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError>;
}

/// Two phases run back to back: `Chain(a, b).run(x) = b.run(a.run(x)?)`.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A, B> Phase for Chain<A, B>
where
    A: Phase,
    B: Phase<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn name(&self) -> &'static str {
        "chain"
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError> {
        log::debug!("phase {} starting", self.first.name());
        let mid = self.first.run(input)?;
        log::debug!("phase {} starting", self.second.name());
        self.second.run(mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct AddOne;
    struct Double;
    struct Fail;

    impl Phase for AddOne {
        type Input = i32;
        type Output = i32;
        fn name(&self) -> &'static str {
            "add-one"
        }
        fn run(&mut self, input: i32) -> Result<i32, CompileError> {
            Ok(input + 1)
        }
    }

    impl Phase for Double {
        type Input = i32;
        type Output = i32;
        fn name(&self) -> &'static str {
            "double"
        }
        fn run(&mut self, input: i32) -> Result<i32, CompileError> {
            Ok(input * 2)
        }
    }

    impl Phase for Fail {
        type Input = i32;
        type Output = i32;
        fn name(&self) -> &'static str {
            "fail"
        }
        fn run(&mut self, _input: i32) -> Result<i32, CompileError> {
            Err(CompileError::new(ErrorKind::MissingMain))
        }
    }

    #[test]
    fn chain_runs_in_order() {
        // (3 + 1) * 2, not (3 * 2) + 1.
        let mut chained = Chain::new(AddOne, Double);
        assert_eq!(chained.run(3).unwrap(), 8);
    }

    #[test]
    fn chain_short_circuits() {
        let mut chained = Chain::new(Fail, Double);
        assert!(chained.run(3).is_err());
    }

    #[test]
    fn chains_nest() {
        let mut chained = Chain::new(Chain::new(AddOne, AddOne), Double);
        assert_eq!(chained.run(0).unwrap(), 4);
    }
}
