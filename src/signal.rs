//! Acondicionamiento de señales 1D: interpolación de huecos y media móvil,
//! más las estadísticas sobre muestras finitas que usa el detector.

/// Rellena los huecos por interpolación lineal contra los vecinos finitos,
/// usando el índice de muestra como variable independiente.
///
/// Fuera del primer/último valor finito se continúa en plano.
/// Una señal sin ningún valor finito se devuelve intacta.
pub fn interpolate_missing(signal: &[Option<f64>]) -> Vec<Option<f64>> {
    let known: Vec<(usize, f64)> = signal
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return signal.to_vec();
    };

    let mut out = Vec::with_capacity(signal.len());
    let mut seg = 0;
    for i in 0..signal.len() {
        let value = if i <= first.0 {
            first.1
        } else if i >= last.0 {
            last.1
        } else {
            while known[seg + 1].0 < i {
                seg += 1;
            }
            let (x0, y0) = known[seg];
            let (x1, y1) = known[seg + 1];
            if x1 == i {
                y1
            } else {
                y0 + (y1 - y0) * (i - x0) as f64 / (x1 - x0) as f64
            }
        };
        out.push(Some(value));
    }
    out
}

/// Media móvil centrada de ventana `window`, misma longitud que la entrada.
///
/// Con `window <= 1` devuelve la señal sin tocar. Interpola los huecos
/// antes de promediar; los bordes se rellenan con ceros y se dividen
/// siempre por `window` (equivalente a `convolve(.., "same")`).
pub fn moving_average(signal: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window <= 1 {
        return signal.to_vec();
    }
    let filled = interpolate_missing(signal);
    if filled.iter().all(|v| v.is_none()) {
        return filled;
    }
    let values: Vec<f64> = filled.iter().map(|v| v.unwrap_or(0.0)).collect();

    let n = values.len() as isize;
    let w = window as isize;
    let half = (w - 1) / 2;
    let scale = 1.0 / window as f64;

    (0..n)
        .map(|i| {
            let hi = i + half;
            let lo = hi - (w - 1);
            let sum: f64 = (lo.max(0)..=hi.min(n - 1))
                .map(|j| values[j as usize])
                .sum();
            Some(sum * scale)
        })
        .collect()
}

fn finite_values(signal: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    signal.iter().flatten().copied().filter(|v| v.is_finite())
}

pub fn finite_count(signal: &[Option<f64>]) -> usize {
    finite_values(signal).count()
}

/// Mínimo entre las muestras finitas
pub fn finite_min(signal: &[Option<f64>]) -> Option<f64> {
    finite_values(signal).reduce(f64::min)
}

/// Posición del primer mínimo global entre las muestras finitas
pub fn finite_argmin(signal: &[Option<f64>]) -> Option<usize> {
    signal
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .fold(None, |best: Option<(usize, f64)>, (i, x)| match best {
            Some((_, b)) if b <= x => best,
            _ => Some((i, x)),
        })
        .map(|(i, _)| i)
}

/// Percentil `p` (0–100) de las muestras finitas con interpolación lineal
/// entre rangos, como `numpy.percentile`.
pub fn finite_percentile(signal: &[Option<f64>], p: f64) -> Option<f64> {
    let mut data: Vec<f64> = finite_values(signal).collect();
    if data.is_empty() {
        return None;
    }
    data.sort_by(f64::total_cmp);
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (data.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(data[lo] + (data[hi] - data[lo]) * frac)
}

/// Mediana de los intervalos positivos entre tiempos consecutivos finitos
pub fn median_positive_step(times: &[Option<f64>]) -> Option<f64> {
    let mut steps: Vec<f64> = times
        .windows(2)
        .filter_map(|w| match (w[0], w[1]) {
            (Some(a), Some(b)) if (b - a).is_finite() && b > a => Some(b - a),
            _ => None,
        })
        .collect();
    if steps.is_empty() {
        return None;
    }
    steps.sort_by(f64::total_cmp);
    let mid = steps.len() / 2;
    Some(if steps.len() % 2 == 0 {
        (steps[mid - 1] + steps[mid]) / 2.0
    } else {
        steps[mid]
    })
}
