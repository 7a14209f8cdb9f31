//! Box-bounded Nelder-Mead simplex minimizer.
//!
//! Derivative-free: the sech² notch makes gradient bookkeeping unpleasant
//! and the objective is cheap, so a simplex search over the clamped box is
//! the whole solver. Candidate vertices are clamped into the box before
//! evaluation; the inequality between the axes is left to the objective,
//! which rejects violations with `+inf`.

use crate::shape::N_PARAMS;

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Fraction of each parameter's box range used for the initial simplex.
const INITIAL_STEP: f64 = 0.05;

pub(super) struct SimplexOutcome {
    pub x: [f64; N_PARAMS],
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub converged: bool,
}

struct Vertex {
    x: [f64; N_PARAMS],
    value: f64,
}

/// Minimize `f` from `x0` inside `[lower, upper]`.
///
/// Parameters with a collapsed interval (`lower == upper`) stay pinned: the
/// initial simplex is flat in those directions and every simplex move
/// preserves flat directions.
pub(super) fn minimize<F>(
    f: F,
    x0: [f64; N_PARAMS],
    lower: [f64; N_PARAMS],
    upper: [f64; N_PARAMS],
    max_iters: usize,
    tolerance: f64,
) -> SimplexOutcome
where
    F: Fn(&[f64; N_PARAMS]) -> f64,
{
    let clamp = |x: &[f64; N_PARAMS]| {
        let mut c = *x;
        for ((v, lo), hi) in c.iter_mut().zip(lower.iter()).zip(upper.iter()) {
            *v = v.clamp(*lo, *hi);
        }
        c
    };

    let mut evaluations = 0;
    let mut eval = |x: &[f64; N_PARAMS]| {
        evaluations += 1;
        f(x)
    };

    // x0 plus one bumped vertex per parameter
    let start = clamp(&x0);
    let mut simplex: Vec<Vertex> = Vec::with_capacity(N_PARAMS + 1);
    let v0 = eval(&start);
    simplex.push(Vertex { x: start, value: v0 });
    for i in 0..N_PARAMS {
        let mut x = start;
        let range = upper[i] - lower[i];
        if range > 0.0 {
            let step = INITIAL_STEP * range;
            x[i] = if x[i] + step <= upper[i] {
                x[i] + step
            } else {
                x[i] - step
            };
        }
        let value = eval(&x);
        simplex.push(Vertex { x, value });
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iters {
        iterations += 1;
        simplex.sort_by(|a, b| a.value.total_cmp(&b.value));

        let best = simplex[0].value;
        let worst = simplex[N_PARAMS].value;
        if worst.is_finite() && worst - best <= tolerance * 1.0f64.max(best.abs()) {
            converged = true;
            break;
        }

        // centroid of all but the worst vertex
        let mut centroid = [0.0; N_PARAMS];
        for vertex in &simplex[..N_PARAMS] {
            for (c, v) in centroid.iter_mut().zip(vertex.x.iter()) {
                *c += v;
            }
        }
        for c in &mut centroid {
            *c /= N_PARAMS as f64;
        }

        let worst_x = simplex[N_PARAMS].x;
        let blend = |from: &[f64; N_PARAMS], toward: &[f64; N_PARAMS], t: f64| {
            let mut out = [0.0; N_PARAMS];
            for i in 0..N_PARAMS {
                out[i] = from[i] + t * (toward[i] - from[i]);
            }
            out
        };

        let reflected = clamp(&blend(&centroid, &worst_x, -REFLECT));
        let f_reflected = eval(&reflected);

        if f_reflected < simplex[0].value {
            let expanded = clamp(&blend(&centroid, &reflected, EXPAND));
            let f_expanded = eval(&expanded);
            simplex[N_PARAMS] = if f_expanded < f_reflected {
                Vertex { x: expanded, value: f_expanded }
            } else {
                Vertex { x: reflected, value: f_reflected }
            };
            continue;
        }

        if f_reflected < simplex[N_PARAMS - 1].value {
            simplex[N_PARAMS] = Vertex { x: reflected, value: f_reflected };
            continue;
        }

        // contraction, outside or inside of the worst vertex
        let (contracted, f_contracted) = if f_reflected < simplex[N_PARAMS].value {
            let x = clamp(&blend(&centroid, &reflected, CONTRACT));
            let v = eval(&x);
            (x, v)
        } else {
            let x = blend(&centroid, &worst_x, CONTRACT);
            let v = eval(&x);
            (x, v)
        };

        if f_contracted < simplex[N_PARAMS].value.min(f_reflected) {
            simplex[N_PARAMS] = Vertex { x: contracted, value: f_contracted };
            continue;
        }

        // shrink everything toward the best vertex
        let best_x = simplex[0].x;
        for vertex in simplex.iter_mut().skip(1) {
            vertex.x = blend(&best_x, &vertex.x, SHRINK);
            vertex.value = eval(&vertex.x);
        }
    }

    simplex.sort_by(|a, b| a.value.total_cmp(&b.value));
    SimplexOutcome {
        x: simplex[0].x,
        value: simplex[0].value,
        iterations,
        evaluations,
        converged,
    }
}
