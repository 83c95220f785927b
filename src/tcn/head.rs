//! Dense regression head

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;

use super::layer::{relu, Dropout, Linear};
use crate::error::Result;

/// `Linear -> ReLU -> Dropout -> Linear` over the flattened block output
#[derive(Debug, Clone)]
pub struct DenseHead {
    pub dense1: Linear,
    pub dropout: Dropout,
    pub dense2: Linear,
}

impl DenseHead {
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        hidden_size: usize,
        output_size: usize,
        dropout: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            dense1: Linear::new(in_features, hidden_size, rng),
            dropout: Dropout::new(dropout),
            dense2: Linear::new(hidden_size, output_size, rng),
        }
    }

    /// Map `[batch, in_features]` to `[batch, output_size]`
    pub fn forward(&self, input: &Array2<f64>, rng: Option<&mut StdRng>) -> Result<Array2<f64>> {
        let hidden = relu(self.dense1.forward(input)?);
        let hidden = self.dropout.forward(hidden, rng);
        self.dense2.forward(&hidden)
    }

    pub fn num_parameters(&self) -> usize {
        self.dense1.num_parameters() + self.dense2.num_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_head_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let head = DenseHead::new(400, 100, 1, 0.4, &mut rng);
        assert_eq!(head.num_parameters(), 400 * 100 + 100 + 100 + 1);

        let output = head.forward(&Array2::ones((5, 400)), None).unwrap();
        assert_eq!(output.dim(), (5, 1));

        assert!(head.forward(&Array2::ones((5, 399)), None).is_err());
    }
}
