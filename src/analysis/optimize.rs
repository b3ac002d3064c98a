use ndarray::{Array1, ArrayView1, ArrayView2};

/// Euclidean projection onto the probability simplex
/// `{w : w >= 0, sum(w) = 1}`.
pub fn project_to_simplex(v: ArrayView1<f64>) -> Array1<f64> {
    let n = v.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (i + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    v.mapv(|x| (x - theta).max(0.0))
}

/// Minimises `sum_i v_i (target_i - (basis . w)_i)^2` over the simplex with
/// accelerated projected gradient (FISTA). `basis` is k x J, `target` and
/// `v` have length k; the result has length J.
pub fn weighted_simplex_regression(
    basis: ArrayView2<f64>,
    target: ArrayView1<f64>,
    v: ArrayView1<f64>,
    max_iterations: usize,
    tolerance: f64,
) -> Array1<f64> {
    let j = basis.ncols();
    let mut w = Array1::from_elem(j, 1.0 / j as f64);
    if j <= 1 {
        return w;
    }

    // Trace bound on the largest eigenvalue of 2 B' V B.
    let lipschitz: f64 = 2.0
        * basis
            .outer_iter()
            .zip(v.iter())
            .map(|(row, &vi)| vi * row.dot(&row))
            .sum::<f64>();
    if lipschitz <= f64::EPSILON {
        return w;
    }

    let loss = |w: &Array1<f64>| {
        let residual = basis.dot(w) - &target;
        (&residual * &residual * &v).sum()
    };

    let mut y = w.clone();
    let mut t = 1.0_f64;
    let mut current = loss(&w);
    let mut restarted = false;
    for _ in 0..max_iterations {
        let residual = basis.dot(&y) - &target;
        let gradient = basis.t().dot(&(&residual * &v)) * 2.0;
        let next = project_to_simplex((&y - &(gradient / lipschitz)).view());
        let next_loss = loss(&next);

        // Momentum overshot: restart from the last iterate.
        if next_loss > current && !restarted {
            y = w.clone();
            t = 1.0;
            restarted = true;
            continue;
        }
        restarted = false;
        current = next_loss;

        let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
        let step = &next - &w;
        y = &next + &(&step * ((t - 1.0) / t_next));

        let change = step.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        w = next;
        t = t_next;
        if change < tolerance {
            break;
        }
    }

    w
}

/// Unconstrained Nelder-Mead minimisation. Returns the best point and its
/// objective value.
pub fn nelder_mead<F>(
    objective: F,
    start: &[f64],
    step: f64,
    max_iterations: usize,
    tolerance: f64,
) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    const REFLECT: f64 = 1.0;
    const EXPAND: f64 = 2.0;
    const CONTRACT: f64 = 0.5;
    const SHRINK: f64 = 0.5;

    let n = start.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.to_vec(), objective(start)));
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += step;
        let value = objective(&vertex);
        simplex.push((vertex, value));
    }
    if n == 0 {
        return simplex.swap_remove(0);
    }

    let along = |from: &[f64], to: &[f64], scale: f64| -> Vec<f64> {
        from.iter()
            .zip(to)
            .map(|(&f, &t)| f + scale * (t - f))
            .collect()
    };

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[n].1;
        if (worst - best).abs() <= tolerance {
            break;
        }

        let mut centroid = vec![0.0; n];
        for (vertex, _) in &simplex[..n] {
            for (c, x) in centroid.iter_mut().zip(vertex) {
                *c += x / n as f64;
            }
        }

        let worst_vertex = simplex[n].0.clone();
        let reflected = along(&centroid, &worst_vertex, -REFLECT);
        let f_reflected = objective(&reflected);

        if f_reflected < best {
            let expanded = along(&centroid, &reflected, EXPAND);
            let f_expanded = objective(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }
        if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < worst {
            let point = along(&centroid, &reflected, CONTRACT);
            let value = objective(&point);
            (point, value)
        } else {
            let point = along(&centroid, &worst_vertex, CONTRACT);
            let value = objective(&point);
            (point, value)
        };
        if f_contracted < f_reflected.min(worst) {
            simplex[n] = (contracted, f_contracted);
            continue;
        }

        let best_vertex = simplex[0].0.clone();
        for entry in simplex.iter_mut().skip(1) {
            let shrunk = along(&best_vertex, &entry.0, SHRINK);
            let value = objective(&shrunk);
            *entry = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex.swap_remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_projection_lands_on_simplex() {
        let projected = project_to_simplex(array![0.8, 0.6, -0.3].view());
        assert_relative_eq!(projected.sum(), 1.0, epsilon = 1e-12);
        assert!(projected.iter().all(|&w| w >= 0.0));
        assert_relative_eq!(projected[0], 0.6, epsilon = 1e-12);
        assert_relative_eq!(projected[1], 0.4, epsilon = 1e-12);
        assert_relative_eq!(projected[2], 0.0);
    }

    #[test]
    fn test_projection_keeps_points_already_on_simplex() {
        let point = array![0.2, 0.3, 0.5];
        let projected = project_to_simplex(point.view());
        for (a, b) in projected.iter().zip(point.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_simplex_regression_recovers_convex_combination() {
        // Columns are controls; target = 0.25 * c0 + 0.75 * c2.
        let basis = Array2::from_shape_vec(
            (3, 3),
            vec![0.0, 4.0, 8.0, 1.0, 0.0, 5.0, 2.0, 3.0, 0.0],
        )
        .unwrap();
        let target = array![6.0, 4.0, 0.5];
        let v = array![1.0, 1.0, 1.0] / 3.0;

        let w = weighted_simplex_regression(basis.view(), target.view(), v.view(), 20_000, 1e-14);

        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(w[0], 0.25, epsilon = 1e-5);
        assert_relative_eq!(w[1], 0.0, epsilon = 1e-5);
        assert_relative_eq!(w[2], 0.75, epsilon = 1e-5);
    }

    #[test]
    fn test_nelder_mead_finds_quadratic_minimum() {
        let (x, fx) = nelder_mead(
            |p| (p[0] - 1.0).powi(2) + 2.0 * (p[1] + 0.5).powi(2),
            &[0.0, 0.0],
            0.5,
            2_000,
            1e-14,
        );
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(x[1], -0.5, epsilon = 1e-4);
        assert!(fx < 1e-8);
    }
}
