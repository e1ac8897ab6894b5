//! Randomized copy/move/drop sequences against a model of the expected count.

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::{registry, Stats, Texture, TextureDesc};
use engine_core::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Acquire,
    Clone,
    Move,
    Take,
    Release,
    Drop,
    Reassign,
}

fn pick(rng: &mut StdRng) -> Op {
    match rng.gen_range(0..7) {
        0 => Op::Acquire,
        1 => Op::Clone,
        2 => Op::Move,
        3 => Op::Take,
        4 => Op::Release,
        5 => Op::Drop,
        _ => Op::Reassign,
    }
}

fn run_sequence(seed: u64, steps: usize) {
    let reg = registry("accounting");
    let stats = Stats::new();
    let key = Guid::from_name("model.png");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut slots: Vec<Handle<Texture>> = Vec::new();

    for step in 0..steps {
        let op = pick(&mut rng);
        let live_before = slots.iter().filter(|h| h.is_valid()).count();

        match op {
            Op::Acquire => slots.push(Texture::get_handle_in(&reg, key, TextureDesc::new(&stats, 4))),
            Op::Clone if !slots.is_empty() => {
                let i = rng.gen_range(0..slots.len());
                let copy = slots[i].clone();
                slots.push(copy);
            }
            Op::Move if !slots.is_empty() => {
                let i = rng.gen_range(0..slots.len());
                let moved = slots.swap_remove(i);
                slots.push(moved);
            }
            Op::Take if !slots.is_empty() => {
                let i = rng.gen_range(0..slots.len());
                let taken = slots[i].take();
                slots.push(taken);
            }
            Op::Release if !slots.is_empty() => {
                let i = rng.gen_range(0..slots.len());
                slots[i].release();
            }
            Op::Drop if !slots.is_empty() => {
                let i = rng.gen_range(0..slots.len());
                drop(slots.swap_remove(i));
            }
            Op::Reassign if !slots.is_empty() => {
                let from = rng.gen_range(0..slots.len());
                let to = rng.gen_range(0..slots.len());
                slots[to] = slots[from].clone();
            }
            _ => {}
        }

        let live = slots.iter().filter(|h| h.is_valid()).count();
        for h in slots.iter().filter(|h| h.is_valid()) {
            assert_eq!(h.ref_count() as usize, live, "seed {seed} step {step} {op:?}");
        }

        assert_eq!(stats.alive(), usize::from(live > 0), "seed {seed} step {step} {op:?}");
        assert_eq!(reg.contains::<Texture>(key), live > 0);
        if live_before > 0 && live == 0 {
            assert_eq!(stats.built(), stats.dropped());
        }
    }

    drop(slots);
    assert_eq!(stats.built(), stats.dropped());
    assert!(reg.is_empty());
}

#[test]
fn random_sequences_match_model() {
    for seed in 0..64 {
        run_sequence(seed, 400);
    }
}

#[test]
fn destroyed_exactly_once_per_generation() {
    let reg = registry("generations");
    let stats = Stats::new();

    for generation in 1..=10 {
        let a = Texture::get_handle_in(&reg, "cycle.png", TextureDesc::new(&stats, 4));
        let b = a.clone();
        let c = b.clone();
        assert_eq!(a.ref_count(), 3);
        drop((a, b, c));
        assert_eq!(stats.built(), generation);
        assert_eq!(stats.dropped(), generation);
    }
}
