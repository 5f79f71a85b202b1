//! # Two conflicting tasks
//!
//! The canonical PCGrad example: two 3-parameter gradients whose first
//! coordinates pull in opposite directions. Prints the Gramian, the weights,
//! and the combined update, and checks the update against both tasks.

use pcgrad_core::{compute_gramian, Aggregator, Matrix, PcGrad, Weighting};

fn main() -> Result<(), pcgrad_core::PcGradError> {
    let j = Matrix::from_rows(&[[-4.0_f64, 1.0, 1.0], [6.0, 1.0, 1.0]])?;

    let gramian = compute_gramian(&j)?;
    println!("Gramian:");
    for i in 0..gramian.dim() {
        println!("  {:?}", gramian.row(i));
    }

    let mut pcgrad = PcGrad::seeded(0);
    let weights = pcgrad.weights(&j)?;
    println!("\nWeights: {:.4?}", weights);

    let update = pcgrad.aggregate(&j)?;
    println!("Update:  {:.4?}", update);

    let naive: Vec<f64> = (0..j.cols()).map(|c| j.row(0)[c] + j.row(1)[c]).collect();
    println!("Plain sum for comparison: {:.4?}", naive);

    println!("\nAlignment of the update with each task gradient:");
    for (t, row) in j.iter_rows().enumerate() {
        let dot: f64 = row.iter().zip(update.iter()).map(|(a, b)| a * b).sum();
        println!("  task {}: {:+.4}", t, dot);
    }

    match Aggregator::<f64>::backward_pre_hook(&pcgrad) {
        Ok(()) => println!("\nbackward allowed"),
        Err(e) => println!("\nbackward refused: {}", e),
    }
    Ok(())
}
