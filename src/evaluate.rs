//! Evaluation blender.
//!
//! Turns a position into one score from the side to move's point of view:
//! a lazy material short-circuit, a choice between the small and big
//! networks (with the auxiliary classifier arbitrating borderline small
//! network results), optimism blending, shuffle damping and a final clamp
//! strictly inside the tablebase range.

use std::fmt::Write as _;

use crate::board::{Board, Color, Piece};
use crate::config::{ClassifierConfig, EvalConfig};
use crate::nnue::{BigNetwork, NetworkOutput, Networks, NnueState, CLASSIFIER_INPUTS, OUTPUT_SCALE};

pub const VALUE_MATE: i32 = 32000;
pub const MAX_PLY: i32 = 246;
pub const VALUE_MATE_IN_MAX_PLY: i32 = VALUE_MATE - MAX_PLY;
pub const VALUE_TB: i32 = VALUE_MATE_IN_MAX_PLY - 1;
pub const VALUE_TB_WIN_IN_MAX_PLY: i32 = VALUE_TB - MAX_PLY;
pub const VALUE_TB_LOSS_IN_MAX_PLY: i32 = -VALUE_TB_WIN_IN_MAX_PLY;

/// Largest magnitude `evaluate` ever returns
pub const EVAL_LIMIT: i32 = VALUE_TB_WIN_IN_MAX_PLY - 1;

/// Which network produced the blended score
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetChoice {
    /// Material alone decided, no network ran
    Lazy,
    Small,
    Big,
}

/// Every intermediate value of one evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalBreakdown {
    pub simple: i32,
    pub choice: NetChoice,
    /// Small network result replaced by the big network's
    pub rechecked: bool,
    /// Classifier output when it was consulted
    pub classifier: Option<f32>,
    pub output: NetworkOutput,
    pub nnue: i32,
    pub complexity: i32,
    /// Value before damping
    pub blended: i32,
    pub value: i32,
}

/// Network score with its complexity, both in internal units.
fn blend_network(output: NetworkOutput, npm_total: i32) -> (i32, i32) {
    let delta = i64::from(24 - npm_total / 9560);
    let (psqt, positional) = (i64::from(output.psqt), i64::from(output.positional));
    let nnue = ((1024 - delta) * psqt + (1024 + delta) * positional) / (1024 * i64::from(OUTPUT_SCALE));
    let complexity = (psqt - positional).abs() / i64::from(OUTPUT_SCALE);
    (saturate(nnue), saturate(complexity))
}

#[inline]
fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn run_big(board: &Board, nets: &Networks, state: &mut NnueState) -> NetworkOutput {
    let acc = state.big_accumulator(nets, board);
    nets.big.evaluate(acc, board.side_to_move(), board.piece_count())
}

fn run_small(board: &Board, nets: &Networks, state: &mut NnueState) -> NetworkOutput {
    let acc = state.small_accumulator(nets, board);
    nets.small.evaluate(acc, board.side_to_move())
}

/// Blender with its tuned constants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluator {
    pub config: EvalConfig,
    pub classifier: ClassifierConfig,
}

impl Evaluator {
    #[must_use]
    pub fn new(config: EvalConfig, classifier: ClassifierConfig) -> Self {
        Evaluator { config, classifier }
    }

    /// Classifier input vector for a small network result.
    #[must_use]
    pub fn classifier_features(
        &self,
        board: &Board,
        output: NetworkOutput,
        complexity: i32,
        optimism: i32,
    ) -> [f32; CLASSIFIER_INPUTS] {
        let c = &self.classifier;
        let scale = OUTPUT_SCALE as f32;
        let non_pawn_pieces: u32 = Piece::NON_PAWN
            .iter()
            .map(|&piece| board.count_both(piece))
            .sum();
        [
            output.psqt as f32 / scale / c.network_norm,
            output.positional as f32 / scale / c.network_norm,
            complexity as f32 / c.complexity_norm,
            optimism as f32 / c.optimism_norm,
            board.count_both(Piece::Pawn) as f32 / c.pawn_norm,
            non_pawn_pieces as f32 / c.piece_norm,
            board.non_pawn_material_total() as f32 / c.material_norm,
            board.simple_eval(board.side_to_move()) as f32 / c.simple_norm,
            board.classical_eval() as f32 / c.classical_norm,
            board.halfmove_clock() as f32 / c.shuffle_norm,
        ]
    }

    /// Score `board` and report how the score was reached.
    ///
    /// `state` must hold `board` at its current ply. `optimism` is the side
    /// to move's optimism supplied by the search.
    ///
    /// # Panics
    ///
    /// Panics if the side to move is in check.
    pub fn evaluate_detailed(
        &self,
        board: &Board,
        nets: &Networks,
        state: &mut NnueState,
        optimism: i32,
    ) -> EvalBreakdown {
        assert!(board.checkers().is_empty(), "evaluate called in check");
        let cfg = &self.config;
        let simple = board.simple_eval(board.side_to_move());

        let mut breakdown = EvalBreakdown {
            simple,
            choice: NetChoice::Lazy,
            rechecked: false,
            classifier: None,
            output: NetworkOutput::default(),
            nnue: 0,
            complexity: 0,
            blended: simple,
            value: 0,
        };

        if simple.abs() <= cfg.lazy_threshold {
            let npm_total = board.non_pawn_material_total();
            let small = simple.abs() > cfg.small_net_threshold;
            let mut output = if small {
                run_small(board, nets, state)
            } else {
                run_big(board, nets, state)
            };
            let (mut nnue, mut complexity) = blend_network(output, npm_total);
            breakdown.choice = if small { NetChoice::Small } else { NetChoice::Big };

            if small && nnue.abs() < cfg.recheck_threshold {
                let consult_big = match &nets.classifier {
                    Some(classifier) => {
                        let features = self.classifier_features(board, output, complexity, optimism);
                        let p = classifier.forward(&features);
                        breakdown.classifier = Some(p);
                        p > self.classifier.threshold
                    }
                    None => true,
                };
                if consult_big {
                    output = run_big(board, nets, state);
                    (nnue, complexity) = blend_network(output, npm_total);
                    breakdown.choice = NetChoice::Big;
                    breakdown.rechecked = true;
                }
            }

            // Network outputs are unbounded, blend in i64
            let mut optimism = i64::from(optimism);
            let mut nnue_wide = i64::from(nnue);
            let spread = i64::from(complexity) + (i64::from(simple) - nnue_wide).abs();
            optimism += optimism * spread / i64::from(cfg.optimism_complexity_div);
            nnue_wide -= nnue_wide * spread / i64::from(cfg.nnue_complexity_div);

            let npm = i64::from(npm_total / 64);
            let net_weight = if breakdown.choice == NetChoice::Small {
                cfg.small_net_weight
            } else {
                cfg.big_net_weight
            };
            let pawns = i64::from(board.count_both(Piece::Pawn));
            let blended = (nnue_wide * (i64::from(net_weight) + npm + i64::from(cfg.pawn_weight) * pawns)
                + optimism * (i64::from(cfg.optimism_base) + npm))
                / 1024;
            breakdown.blended = saturate(blended);
            breakdown.output = output;
            breakdown.nnue = saturate(nnue_wide);
            breakdown.complexity = complexity;
        }

        let shuffle = i64::from(board.halfmove_clock()).min(i64::from(cfg.damping_cap));
        let damped = i64::from(breakdown.blended) * (i64::from(cfg.damping_base) - shuffle)
            / i64::from(cfg.damping_div);
        breakdown.value = saturate(damped).clamp(VALUE_TB_LOSS_IN_MAX_PLY + 1, VALUE_TB_WIN_IN_MAX_PLY - 1);
        breakdown
    }

    /// Score from the side to move's point of view.
    pub fn evaluate(&self, board: &Board, nets: &Networks, state: &mut NnueState, optimism: i32) -> i32 {
        self.evaluate_detailed(board, nets, state, optimism).value
    }

    /// Human-readable breakdown, scores from White's point of view.
    #[must_use]
    pub fn trace(&self, board: &Board, nets: &Networks) -> String {
        if board.in_check() {
            return "Final evaluation: none (in check)".to_string();
        }
        let white = |v: i32| if board.side_to_move() == Color::White { v } else { -v };
        let mut state = NnueState::new(nets, board);

        let big = run_big(board, nets, &mut state);
        let small = run_small(board, nets, &mut state);
        let details = self.evaluate_detailed(board, nets, &mut state, 0);

        let mut out = String::new();
        let _ = writeln!(out, "Simple evaluation      {:+}", white(details.simple));
        let _ = writeln!(
            out,
            "Big network (bucket {}) psqt {:+} positional {:+}",
            BigNetwork::bucket(board.piece_count()),
            white(big.psqt / OUTPUT_SCALE),
            white(big.positional / OUTPUT_SCALE)
        );
        let _ = writeln!(
            out,
            "Small network          psqt {:+} positional {:+}",
            white(small.psqt / OUTPUT_SCALE),
            white(small.positional / OUTPUT_SCALE)
        );
        let choice = match details.choice {
            NetChoice::Lazy => "none (lazy)",
            NetChoice::Small => "small",
            NetChoice::Big if details.rechecked => "big (rechecked)",
            NetChoice::Big => "big",
        };
        let _ = writeln!(out, "Network used           {choice}");
        if let Some(p) = details.classifier {
            let _ = writeln!(out, "Classifier             {p:.3}");
        }
        let _ = writeln!(out, "Complexity             {}", details.complexity);
        let _ = write!(out, "Final evaluation       {:+} (white side)", white(details.value));
        out
    }
}

/// Score `board` with the default constants.
pub fn evaluate(board: &Board, nets: &Networks, state: &mut NnueState, optimism: i32) -> i32 {
    Evaluator::default().evaluate(board, nets, state, optimism)
}

/// [`Evaluator::trace`] with the default constants.
#[must_use]
pub fn trace(board: &Board, nets: &Networks) -> String {
    Evaluator::default().trace(board, nets)
}
