use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Generation padding to a specific max length, typically to correlate with tokenzed sequences
pub fn pad_to<B: Backend>(
    pad_token: usize,
    tokens_list: Vec<Vec<usize>>,
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = tokens_list.len();

    let mut tensor = Tensor::<B, 2, Int>::zeros([batch_size, seq_length], device);
    tensor = tensor.add_scalar(pad_token as i64);

    for (index, tokens) in tokens_list.into_iter().enumerate() {
        let length = tokens.len().min(seq_length);
        if length == 0 {
            continue;
        }

        tensor = tensor.slice_assign(
            [index..index + 1, 0..length],
            Tensor::from_data(
                Data::new(
                    tokens
                        .into_iter()
                        .take(length)
                        .map(|e| (e as i64).elem())
                        .collect(),
                    Shape::new([1, length]),
                ),
                device,
            ),
        );
    }

    tensor
}

/// A float weight per token: 1.0 for real tokens, 0.0 for padding
pub fn non_pad_weights<B: Backend>(tokens: Tensor<B, 1, Int>, pad_token: usize) -> Tensor<B, 1> {
    tokens.equal_elem(pad_token as i64).bool_not().float()
}

/// Read a 2D integer tensor back into per-row token ids
pub fn to_rows<B: Backend>(tensor: Tensor<B, 2, Int>) -> Vec<Vec<usize>> {
    let [_, seq_length] = tensor.dims();
    if seq_length == 0 {
        return Vec::new();
    }

    let values = tensor.into_data().convert::<i64>().value;

    values
        .chunks(seq_length)
        .map(|row| row.iter().map(|id| *id as usize).collect())
        .collect()
}
