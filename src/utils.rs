use crate::population::Population;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// a macro to declare simple Vec<String>
#[macro_export]
macro_rules! string_vec {
    ($($x:expr),*) => {
        vec![$($x.into()),*]
    };
}

/// info! that keeps ANSI colors only when the colorful display is enabled
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        if $colorful {
            log::info!("{}", message);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&message));
        }
    }};
}

/// Indices of the true bits of a feature mask, in column order
pub fn selected_index(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, &keep)| keep)
        .map(|(i, _)| i)
        .collect()
}

/// Remove ANSI escape sequences (e.g. "\x1b[1;93m") from a string
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// a function used essentially in CV that split randomly a Vec<T> into p Vec<T> of approximatively the same size
pub fn split_into_balanced_random_chunks<T: std::clone::Clone>(vec: Vec<T>, p: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<T>> {
    // Step 1: Shuffle the original vector
    let mut shuffled = vec;
    shuffled.shuffle(rng);

    // Step 2: Determine sizes for balanced chunks
    let n = shuffled.len();
    let base_size = n / p; // Minimum size for each chunk
    let extra_elements = n % p; // Remaining elements to distribute

    // Step 3: Create chunks with balanced sizes
    let mut chunks = Vec::new();
    let mut start = 0;

    for i in 0..p {
        let chunk_size = base_size + if i < extra_elements { 1 } else { 0 }; // Add one extra element to the first `extra_elements` chunks
        let end = start + chunk_size;
        chunks.push(shuffled[start..end].to_vec());
        start = end;
    }

    chunks
}

/// Arithmetic mean and population standard deviation; an infinite value propagates to the mean.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if !mean.is_finite() {
        return (mean, f64::NAN);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Index of the first maximum, NaN values being ignored
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if values[b] >= *v => {}
            _ => best = Some(i),
        }
    }
    best
}

pub fn display_epoch_legend(colorful: bool) -> String {
    if colorful {
        "Legend: [\x1b[1mgeneration\x1b[0m] best \x1b[1;92mfit\x1b[0m (k) | mean fit | best-so-far | stale generations".to_string()
    } else {
        "Legend: [generation] best fit (k) | mean fit | best-so-far | stale generations".to_string()
    }
}

/// One line summary of a generation
pub fn display_epoch(pop: &Population, generation: usize, best_so_far: f64, no_improve: usize) -> String {
    let (best_fit, best_k) = match pop.best() {
        Some(best) => (best.fit, best.k),
        None => (f64::NEG_INFINITY, 0),
    };
    let fits: Vec<f64> = pop.individuals.iter().map(|i| i.fit).collect();
    let (mean, _) = mean_and_std(&fits);
    let stale = if no_improve == 0 {
        "\x1b[1;92mimproved\x1b[0m".to_string()
    } else {
        format!("\x1b[2;97m{} stale\x1b[0m", no_improve)
    };
    format!(
        "[\x1b[1m{:>4}\x1b[0m] \x1b[1;92m{:.4}\x1b[0m ({:>3}) | {:.4} | {:.4} | {}",
        generation, best_fit, best_k, mean, best_so_far, stale
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_split_into_balanced_random_chunks_sizes() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let chunks = split_into_balanced_random_chunks((0..11).collect::<Vec<usize>>(), 3, &mut rng);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3], "extra elements should go to the first chunks");

        let mut all: Vec<usize> = chunks.into_iter().flatten().collect();
        all.sort();
        assert_eq!(all, (0..11).collect::<Vec<usize>>(), "chunks should be a partition of the input");
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = split_into_balanced_random_chunks((0..20).collect::<Vec<usize>>(), 4, &mut ChaCha8Rng::seed_from_u64(1));
        let b = split_into_balanced_random_chunks((0..20).collect::<Vec<usize>>(), 4, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_mean_and_std() {
        let (m, s) = mean_and_std(&[1.0, 2.0, 3.0, 4.0]);
        assert!((m - 2.5).abs() < 1e-12);
        assert!((s - 1.118033988749895).abs() < 1e-12);
        let (m, _) = mean_and_std(&[1.0, f64::NEG_INFINITY]);
        assert_eq!(m, f64::NEG_INFINITY);
    }

    #[test]
    fn test_argmax_first_keeps_first_maximum() {
        assert_eq!(argmax_first(&[0.1, 0.5, 0.5, 0.2]), Some(1));
        assert_eq!(argmax_first(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), Some(0));
        assert_eq!(argmax_first(&[f64::NAN, 0.3]), Some(1));
        assert_eq!(argmax_first(&[]), None);
    }

    #[test]
    fn test_selected_index() {
        assert_eq!(selected_index(&[false, true, true, false, true]), vec![1, 2, 4]);
        assert!(selected_index(&[false, false]).is_empty());
        assert!(selected_index(&[]).is_empty());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;93mFold #1\x1b[0m done"), "Fold #1 done");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
