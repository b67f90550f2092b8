//! Per-inference tensor accounting
//!
//! Every tensor an inference allocates is registered with a [`TensorScope`].
//! The scope releases all of them when it is dropped, so cleanup runs on
//! every exit path: success, execution failure or extraction failure.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use tract_onnx::prelude::{TVec, TValue, Tensor};

/// Tracks how many inference tensors are currently alive
#[derive(Debug, Default)]
pub struct TensorPool {
    live: AtomicUsize,
}

impl TensorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope bound to a single inference call
    pub fn scope(&self) -> TensorScope<'_> {
        TensorScope {
            pool: self,
            held: TVec::new(),
            tracked: 0,
        }
    }

    /// Tensors allocated by in-flight inferences
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Owns the tensors of one inference call until it ends
pub struct TensorScope<'a> {
    pool: &'a TensorPool,
    held: TVec<TValue>,
    tracked: usize,
}

impl<'a> TensorScope<'a> {
    /// Allocate the `[1, D]` input tensor for `values`
    pub fn input(&mut self, values: &[f32]) -> Result<Tensor> {
        let tensor = Tensor::from_shape(&[1, values.len()], values)?;
        self.track(1);
        Ok(tensor)
    }

    /// Take ownership of the model outputs; they live until the scope ends
    pub fn adopt(&mut self, outputs: TVec<TValue>) -> &[TValue] {
        self.track(outputs.len());
        self.held = outputs;
        &self.held
    }

    fn track(&mut self, count: usize) {
        self.tracked += count;
        self.pool.live.fetch_add(count, Ordering::AcqRel);
    }
}

impl Drop for TensorScope<'_> {
    fn drop(&mut self) {
        self.held.clear();
        self.pool.live.fetch_sub(self.tracked, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tract_onnx::prelude::tvec;

    #[test]
    fn test_scope_releases_on_drop() {
        let pool = TensorPool::new();
        {
            let mut scope = pool.scope();
            let input = scope.input(&[1.0, 2.0, 3.0]).unwrap();
            assert_eq!(input.shape(), &[1, 3]);
            assert_eq!(pool.live(), 1);

            let outputs = scope.adopt(tvec!(input.into()));
            assert_eq!(outputs.len(), 1);
            assert_eq!(pool.live(), 2);
        }
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_scope_releases_on_early_return() {
        fn failing(pool: &TensorPool) -> Result<()> {
            let mut scope = pool.scope();
            let _input = scope.input(&[0.0; 4])?;
            anyhow::bail!("execution failed")
        }

        let pool = TensorPool::new();
        assert!(failing(&pool).is_err());
        assert_eq!(pool.live(), 0);
    }
}
