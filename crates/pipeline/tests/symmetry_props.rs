use gomoku_core::{Board, Move, Side};
use gomoku_pipeline::{augment, Symmetry};
use gomoku_selfplay::EpisodeSample;
use proptest::collection::vec;
use proptest::prelude::*;

fn arb_sample() -> impl Strategy<Value = EpisodeSample> {
    (1usize..8)
        .prop_flat_map(|n| (Just(n), vec(0u8..3, n * n), vec(0.0f32..1.0, n * n), any::<bool>()))
        .prop_map(|(n, cells, policy, black)| {
            let cells = cells
                .into_iter()
                .map(|c| match c {
                    1 => Some(Side::Black),
                    2 => Some(Side::White),
                    _ => None,
                })
                .collect();
            let side = if black { Side::Black } else { Side::White };
            EpisodeSample::new(Board::from_cells(n, cells).unwrap(), side, policy, 0.0)
        })
}

proptest! {
    #[test]
    fn inverse_restores_sample(sample in arb_sample()) {
        for sym in Symmetry::all() {
            let there = sym.apply(&sample).unwrap();
            let back = sym.inverse().apply(&there).unwrap();
            prop_assert_eq!(&back, &sample);
        }
    }

    #[test]
    fn variants_preserve_contents(sample in arb_sample()) {
        let variants = augment(&sample).unwrap();
        prop_assert_eq!(variants.len(), 8);
        prop_assert_eq!(&variants[0], &sample);

        let mut expected = sample.policy.clone();
        expected.sort_by(f32::total_cmp);
        for v in &variants {
            prop_assert_eq!(v.board.stone_count(), sample.board.stone_count());
            let mut got = v.policy.clone();
            got.sort_by(f32::total_cmp);
            prop_assert_eq!(got, expected.clone());
        }
    }

    #[test]
    fn symmetries_compose_with_inverse(
        q in 0u8..4,
        flipped in any::<bool>(),
        (n, r, c) in (1usize..10).prop_flat_map(|n| (Just(n), 0..n, 0..n)),
    ) {
        let sym = Symmetry::new(q, flipped);
        let mv = Move::new(r, c);
        prop_assert_eq!(sym.inverse().map(sym.map(mv, n), n), mv);
    }
}
