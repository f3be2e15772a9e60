use ndarray::{ArrayView1, ArrayView2, Zip};

/// The outcome of a single training epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// Mean of the epoch's batch losses.
    pub loss: f32,
    /// Fraction of samples whose arg-max prediction matches the arg-max label.
    pub accuracy: f32,
}

/// Returns the index of the greatest value of `row`, the first one on ties. `None` if the row
/// is empty.
pub fn argmax(row: ArrayView1<f32>) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Counts the rows where the prediction's arg-max agrees with the label's.
pub fn correct_predictions(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> usize {
    let mut correct = 0;

    Zip::from(y_pred.rows()).and(y.rows()).for_each(|p, t| {
        if argmax(p).is_some() && argmax(p) == argmax(t) {
            correct += 1;
        }
    });

    correct
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn argmax_prefers_the_first_maximum() {
        assert_eq!(argmax(array![0.1f32, 0.7, 0.7].view()), Some(1));
        assert_eq!(argmax(array![3f32].view()), Some(0));
        let empty: [f32; 0] = [];
        assert_eq!(argmax(ArrayView1::from(&empty)), None);
    }

    #[test]
    fn counts_agreeing_rows() {
        let y_pred = array![[0.9f32, 0.1], [0.2, 0.8], [0.6, 0.4]];
        let y = array![[1f32, 0.], [1., 0.], [1., 0.]];

        assert_eq!(correct_predictions(y_pred.view(), y.view()), 2);
    }
}
