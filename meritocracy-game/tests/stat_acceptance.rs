use meritocracy_game::{PlayerId, RoundSettler, SettlementConfig, SettlementRng, Submission, rank};
use std::convert::TryFrom;

const SAMPLE_SIZE: usize = 5000;
const TOLERANCE: f64 = 0.025;

fn rate(count: usize) -> f64 {
    f64::from(u32::try_from(count).expect("count fits"))
        / f64::from(u32::try_from(SAMPLE_SIZE).expect("sample size fits"))
}

#[test]
fn tied_pair_orders_evenly() {
    let subs = vec![Submission::new("first", 5.0), Submission::new("second", 5.0)];
    let mut rng = SettlementRng::from_user_seed(0xACED);

    let mut first_on_top = 0usize;
    for _ in 0..SAMPLE_SIZE {
        let ranked = rank(&subs, rng.tie_break());
        if ranked[0].submission.player.as_str() == "first" {
            first_on_top += 1;
        }
    }
    let observed = rate(first_on_top);
    assert!(
        (observed - 0.5).abs() <= TOLERANCE,
        "tie-break drifted: observed {observed:.4}"
    );
}

#[test]
fn tied_triple_spreads_top_slot_uniformly() {
    let subs = vec![
        Submission::new("a", 1.0),
        Submission::new("b", 1.0),
        Submission::new("c", 1.0),
    ];
    let mut rng = SettlementRng::from_user_seed(0xB0B);

    let mut top_counts = [0usize; 3];
    for _ in 0..SAMPLE_SIZE {
        let ranked = rank(&subs, rng.tie_break());
        let idx = match ranked[0].submission.player.as_str() {
            "a" => 0,
            "b" => 1,
            _ => 2,
        };
        top_counts[idx] += 1;
    }
    for count in top_counts {
        assert!((rate(count) - 1.0 / 3.0).abs() <= TOLERANCE);
    }
}

#[test]
fn ties_never_cross_strictly_ordered_players() {
    let subs = vec![
        Submission::new("low", 1.0),
        Submission::new("tie-1", 3.0),
        Submission::new("tie-2", 3.0),
        Submission::new("high", 9.0),
    ];
    let cfg = SettlementConfig {
        subgroup_size: 2,
        ..SettlementConfig::default()
    };
    let mut settler = RoundSettler::new(cfg, 1).unwrap();
    for seed in 0..200 {
        settler.reseed(seed);
        let outcome = settler.settle(subs.clone()).unwrap();
        let ranking = outcome.ranking();
        assert_eq!(ranking[0], PlayerId::from("high"));
        assert_eq!(ranking[3], PlayerId::from("low"));
    }
}
