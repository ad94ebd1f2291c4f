use ndarray::{Array1, ArrayView2, Axis};

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

/// Averages the token embeddings (`[seq, hidden]`) whose mask entry is non-zero.
pub(crate) fn mean_pool(token_embeddings: ArrayView2<f32>, attention_mask: &[u32]) -> Array1<f32> {
    let hidden = token_embeddings.len_of(Axis(1));
    let mut sum = Array1::<f32>::zeros(hidden);
    let mut count = 0usize;

    for (row, &mask) in token_embeddings.axis_iter(Axis(0)).zip(attention_mask) {
        if mask != 0 {
            sum += &row;
            count += 1;
        }
    }

    if count == 0 {
        sum
    } else {
        sum / count as f32
    }
}
