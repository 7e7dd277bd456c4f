use flexi_logger::{opt_format, Logger};
use log::{info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tncompress::random::random_tensor_train;
use tncompress::tensornetwork::factorization::TruncationOptions;

fn main() {
    let _logger = Logger::with(LevelFilter::Debug)
        .format(opt_format)
        .start()
        .unwrap();
    info!("Running basic_usage");

    let seed = 23;
    let physical = [3; 6];
    let ranks = [3, 9, 12, 9, 3];
    let max_rank = 4;
    info!("Configuration: seed={seed}, physical={physical:?}, ranks={ranks:?}, max_rank={max_rank}");

    let mut rng = StdRng::seed_from_u64(seed);
    let tn = random_tensor_train(&physical, &ranks, &mut rng);
    let norm = tn.frob_norm();
    info!("Norm of the random tensor train: {norm}");

    // Move the orthogonality center to the last core, then round backwards
    let mut rounded = tn.clone();
    let last = physical.len() - 1;
    for i in 0..last {
        rounded.transfer_core(i, i + 1, false);
    }
    let options = TruncationOptions::default().with_max_rank(max_rank);
    for i in (1..=last).rev() {
        rounded.round_edge(i, i - 1, &options);
    }

    let mut difference = tn.fully_contracted_tensor().into_dense();
    difference -= &rounded.fully_contracted_tensor().into_dense();
    info!(
        "Relative error after rounding: {}",
        difference.frob_norm() / norm
    );
    info!(
        "Entries before and after rounding: {} vs {}",
        tn.datasize(),
        rounded.datasize()
    );
    println!("{}", rounded.to_dot());
}
