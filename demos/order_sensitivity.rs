//! # Order sensitivity with three tasks
//!
//! With three or more tasks, the order in which conflicts are resolved
//! matters. This demo runs the same Gramian under several seeds, prints the
//! resulting weights, and dumps the per-iteration trace of one run.

use pcgrad_core::{compute_gramian, Matrix, PcGradWeighting, RngPermutations};

fn main() -> Result<(), pcgrad_core::PcGradError> {
    // g0 = (1, 0), g1 = (-1, 1), g2 = (0, -1): a chain of conflicts.
    let j = Matrix::from_rows(&[[1.0_f64, 0.0], [-1.0, 1.0], [0.0, -1.0]])?;
    let gramian = compute_gramian(&j)?;
    let engine = PcGradWeighting::new();

    println!("seed  weights");
    for seed in 0..6 {
        let w = engine.compute_weights(&gramian, &mut RngPermutations::seeded(seed))?;
        println!("{:>4}  {:.3?}", seed, w);
    }

    let (weights, trace) = engine.compute_weights_traced(&gramian, &mut RngPermutations::seeded(0))?;
    println!("\nTrace of seed 0 ({} corrections):", trace.total_corrections());
    for step in &trace.steps {
        println!("  i={} order={:?}", step.index, step.permutation);
        for c in &step.corrections {
            println!(
                "    vs g{}: <g_i^PC, g_j> = {:+.3} -> coefficient += {:.3}",
                c.against, c.inner_product, c.delta
            );
        }
        println!("    coefficients {:.3?}", step.coefficients);
    }
    println!("weights {:.3?}", weights);
    Ok(())
}
