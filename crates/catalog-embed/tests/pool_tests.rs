use candle_core::{DType, Device, Tensor};
use catalog_embed::masked_mean_l2;

#[test]
fn masked_tokens_do_not_contribute_to_the_mean() {
    let dev = Device::Cpu;
    // Batch of two, two tokens each, hidden dim 2.
    let h = Tensor::from_slice(&[3.0f32, 4.0, 100.0, 100.0, 1.0, 0.0, 0.0, 1.0], (2, 2, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1i64, 0, 1, 1], (2, 2), &dev).unwrap().to_dtype(DType::F32).unwrap();
    let out: Vec<Vec<f32>> = masked_mean_l2(&h, &mask).unwrap().to_vec2().unwrap();

    // First row keeps only [3,4] -> [0.6, 0.8]; second averages to [0.5,0.5] -> unit diagonal.
    let expected = [[0.6f32, 0.8], [std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2]];
    for (row, exp) in out.iter().zip(expected) {
        for (a, b) in row.iter().zip(exp) {
            assert!((a - b).abs() < 1e-5, "a={a} b={b}");
        }
    }
}

#[test]
fn rejects_non_three_dimensional_hidden_states() {
    let dev = Device::Cpu;
    let h = Tensor::zeros((2, 4), DType::F32, &dev).unwrap();
    let mask = Tensor::ones((2, 4), DType::F32, &dev).unwrap();
    assert!(masked_mean_l2(&h, &mask).is_err());
}
