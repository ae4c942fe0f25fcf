use approx::assert_abs_diff_eq;
use briny_kernels::backend::{Backend, Device, GemmKernel};
use briny_kernels::error::Error;
use briny_kernels::ops::cpu::CpuBackend;
use briny_kernels::ops::dispatch::DispatchBackend;
use briny_kernels::random::RngState;
use briny_kernels::tensor;
use briny_kernels::tensors::{Layout, Tensor};

const KERNELS: [GemmKernel; 2] = [GemmKernel::Blas, GemmKernel::Asm];

fn seeded(shape: Vec<usize>, seed: u64) -> Tensor<f64> {
    let mut t = Tensor::zeros(shape);
    CpuBackend
        .uniform_distribution(-1.0, 1.0, &mut t, &mut RngState::seeded(seed))
        .unwrap();
    t
}

#[test]
fn rectlin_and_its_derivative() {
    let x = tensor!([-2.0, -1.0, 0.0, 1.0, 2.0]);
    let mut y = x.zeros_like();
    CpuBackend.rectlin_apply(&x, 0.0, &mut y).unwrap();
    assert_eq!(y.data(), &[0.0, 0.0, 0.0, 1.0, 2.0]);

    CpuBackend.rectlin_apply(&x, 0.5, &mut y).unwrap();
    assert_eq!(y.data(), &[-1.0, -0.5, 0.0, 1.0, 2.0]);

    let mut g = Tensor::full(vec![5], 1.0);
    CpuBackend.rectlin_derivative(&x, 0.0, &mut g).unwrap();
    assert_eq!(g.data(), &[0.0, 0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn rectlin_derivative_uses_slope_at_and_below_zero() {
    let x = tensor!([-2.0, 0.0, 3.0]);
    let mut g = Tensor::full(vec![3], 1.0);
    CpuBackend.rectlin_derivative(&x, 0.25, &mut g).unwrap();
    assert_eq!(g.data(), &[0.25, 0.25, 1.0]);
}

#[test]
fn logistic_is_centered_and_bounded() {
    let x = tensor!([-30.0, -1.0, 0.0, 1.0, 30.0]);
    let mut y = x.zeros_like();
    CpuBackend.logistic_apply(&x, &mut y).unwrap();
    assert_abs_diff_eq!(y.data()[2], 0.5);
    assert!(y.data().iter().all(|&v| v > 0.0 && v < 1.0));
    assert_abs_diff_eq!(y.data()[1] + y.data()[3], 1.0, epsilon = 1e-12);
}

#[test]
fn softmax_rows_sum_to_one() {
    let x = tensor!([[1.0, 2.0, 3.0], [0.0, 0.0, 0.0], [-1.0, 5.0, 0.5]]);
    let mut y = x.zeros_like();
    CpuBackend.softmax_apply(&x, &mut y).unwrap();
    for row in y.data().chunks(3) {
        assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(y.data()[3], 1.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn softmax_short_cut_passes_gradient_through() {
    let x = tensor!([[1.0, 2.0]]);
    let mut g = tensor!([[0.25, -0.25]]);
    CpuBackend.softmax_derivative(&x, &mut g, true).unwrap();
    assert_eq!(g.data(), &[0.25, -0.25]);
}

#[test]
fn bias_identities() {
    let x = seeded(vec![4, 3], 1);
    let zero = Tensor::zeros(vec![3]);
    let mut y = x.zeros_like();
    CpuBackend.bias_forward(&x, &zero, &mut y).unwrap();
    assert_eq!(y, x);

    let ones = Tensor::full(vec![4, 3], 1.0);
    let mut update = Tensor::zeros(vec![3]);
    CpuBackend.bias_backward_update(&ones, &mut update).unwrap();
    assert_eq!(update.data(), &[4.0, 4.0, 4.0]);
}

#[test]
fn plain_gradient_descent_step() {
    let mut w = tensor!([1.0, -1.0, 0.5]);
    let mut g = tensor!([2.0, -2.0, 0.0]);
    let mut v = Tensor::zeros(vec![3]);
    CpuBackend
        .gradient_descent(0.0, 0.1, 0.0, 2, &mut w, &mut g, &mut v)
        .unwrap();
    assert_abs_diff_eq!(w.data()[0], 0.9, epsilon = 1e-12);
    assert_abs_diff_eq!(w.data()[1], -0.9, epsilon = 1e-12);
    assert_abs_diff_eq!(w.data()[2], 0.5);
    assert_abs_diff_eq!(v.data()[0], -0.1, epsilon = 1e-12);
}

#[test]
fn matrix_dot_known_product() {
    let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
    for kernel in KERNELS {
        let mut c = Tensor::zeros(vec![2, 2]);
        CpuBackend
            .matrix_dot(&a, &b, false, false, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0], "kernel {kernel}");
    }
}

#[test]
fn matrix_dot_transposes_and_layouts() {
    let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
    // [[1,2],[3,4]] stored column by column
    let a_col = Tensor::new(vec![2, 2], vec![1.0, 3.0, 2.0, 4.0]).with_layout(Layout::ColumnMajor);
    for kernel in KERNELS {
        let mut c = Tensor::zeros(vec![2, 2]);
        CpuBackend
            .matrix_dot(&a, &b, true, false, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[26.0, 30.0, 38.0, 44.0], "transa, kernel {kernel}");

        CpuBackend
            .matrix_dot(&a, &b, false, true, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[17.0, 23.0, 39.0, 53.0], "transb, kernel {kernel}");

        CpuBackend
            .matrix_dot(&a_col, &b, false, false, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0], "column-major, kernel {kernel}");

        CpuBackend
            .matrix_dot(&a_col, &b, true, false, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[26.0, 30.0, 38.0, 44.0], "column-major transa, kernel {kernel}");
    }
}

#[test]
fn matrix_dot_alpha_beta() {
    let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
    let b = tensor!([[5.0, 6.0], [7.0, 8.0]]);
    for kernel in KERNELS {
        let mut c = Tensor::full(vec![2, 2], 1.0);
        CpuBackend
            .matrix_dot(&a, &b, false, false, 2.0, 1.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[39.0, 45.0, 87.0, 101.0], "kernel {kernel}");

        // beta = 0 ignores whatever the output held
        let mut c = Tensor::full(vec![2, 2], f64::NAN);
        CpuBackend
            .matrix_dot(&a, &b, false, false, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0], "kernel {kernel}");
    }
}

#[test]
fn blas_and_asm_agree() {
    let a = seeded(vec![33, 17], 10);
    let b = seeded(vec![9, 33], 11);
    let mut blas = Tensor::zeros(vec![17, 9]);
    let mut asm = Tensor::zeros(vec![17, 9]);
    CpuBackend
        .matrix_dot(&a, &b, true, true, 0.5, 0.0, &mut blas, GemmKernel::Blas)
        .unwrap();
    CpuBackend
        .matrix_dot(&a, &b, true, true, 0.5, 0.0, &mut asm, GemmKernel::Asm)
        .unwrap();
    for (x, y) in blas.data().iter().zip(asm.data()) {
        assert_abs_diff_eq!(x, y, epsilon = 1e-10);
    }
}

#[test]
#[should_panic(expected = "matrix_dot: common dimension mismatch")]
fn matrix_dot_rejects_bad_shapes() {
    let a: Tensor<f32> = Tensor::zeros(vec![2, 3]);
    let b: Tensor<f32> = Tensor::zeros(vec![2, 3]);
    let mut c = Tensor::zeros(vec![2, 3]);
    let _ = CpuBackend.matrix_dot(&a, &b, false, false, 1.0, 0.0, &mut c, GemmKernel::Blas);
}

#[test]
fn classify_accuracy() {
    let y = tensor!([[0.1, 0.9], [0.8, 0.2]]);
    let all_right = tensor!([[0.0, 1.0], [1.0, 0.0]]);
    let half_right = tensor!([[0.0, 1.0], [0.0, 1.0]]);
    assert_eq!(CpuBackend.evaluate_classify(&y, &all_right).unwrap(), 1.0);
    assert_eq!(CpuBackend.evaluate_classify(&y, &half_right).unwrap(), 0.5);
}

#[test]
fn binary_cross_entropy_is_positive_at_one_half() {
    let half = Tensor::full(vec![2, 2], 0.5);
    let loss = CpuBackend.cross_entropy_binary_apply(&half, &half).unwrap();
    assert!(loss > 0.0);
    assert_abs_diff_eq!(loss, 2.0 * std::f64::consts::LN_2, epsilon = 1e-12);
}

#[test]
fn loss_derivatives_are_differences() {
    let x = tensor!([[0.2, 0.8]]);
    let t = tensor!([[0.0, 1.0]]);
    let mut g = x.zeros_like();
    CpuBackend.square_mean_derivative(&x, &t, &mut g).unwrap();
    assert_abs_diff_eq!(g.data()[0], 0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(g.data()[1], -0.2, epsilon = 1e-12);
    CpuBackend.abs_mean_derivative(&x, &t, &mut g).unwrap();
    assert_eq!(g.data(), &[1.0, -1.0]);
}

#[test]
fn elementwise_helpers() {
    let a = tensor!([1.0, -2.0, 3.0]);
    let b = tensor!([0.5, 0.5, 4.0]);
    let mut out = a.zeros_like();
    CpuBackend.maximum(&a, &b, &mut out).unwrap();
    assert_eq!(out.data(), &[1.0, 0.5, 4.0]);
    CpuBackend.minus_scalar(&a, 1.0, &mut out).unwrap();
    assert_eq!(out.data(), &[0.0, -3.0, 2.0]);
    CpuBackend.multiply(&a, &b, &mut out).unwrap();
    assert_eq!(out.data(), &[0.5, -1.0, 12.0]);
    assert_eq!(CpuBackend.sum(&a).unwrap(), 2.0);
}

#[test]
fn binary_mask_density_tracks_keep() {
    let mut mask: Tensor<f32> = Tensor::zeros(vec![100, 100]);
    CpuBackend
        .make_binary_mask(0.0, 1.0, 0.3, &mut mask, &mut RngState::seeded(4))
        .unwrap();
    assert!(mask.data().iter().all(|&x| x == 0.0 || x == 1.0));
    let density = CpuBackend.sum(&mask).unwrap() / mask.size() as f32;
    assert!((density - 0.3).abs() < 0.03, "density {density}");
}

#[test]
fn seeded_states_replay_draws() {
    let mut a = RngState::seeded(9);
    let mut b = RngState::seeded(9);
    let mut x: Tensor<f64> = Tensor::zeros(vec![32]);
    let mut y: Tensor<f64> = Tensor::zeros(vec![32]);
    CpuBackend.normal_distribution(0.0, 1.0, &mut x, &mut a).unwrap();
    CpuBackend.normal_distribution(0.0, 1.0, &mut y, &mut b).unwrap();
    assert_eq!(x, y);

    // the counter moves on, so the next call draws a different stream
    CpuBackend.normal_distribution(0.0, 1.0, &mut y, &mut b).unwrap();
    assert_ne!(x, y);
    assert_eq!(b.draws(), 2);
}

#[test]
fn batch_norm_is_unimplemented() {
    let x: Tensor<f32> = Tensor::zeros(vec![2, 2]);
    let (mut v, mut h, mut o) = (x.clone(), x.clone(), x.clone());
    let err = CpuBackend
        .batch_norm_forward(&x, &x, &x, 1e-5, &mut v, &mut h, &mut o)
        .unwrap_err();
    assert!(matches!(err, Error::Unimplemented("batch_norm_forward")));
}

#[test]
fn dispatch_on_cpu_matches_host() {
    let backend = DispatchBackend::new(Device::Cpu);
    assert_eq!(backend.selected(), Device::Cpu);
    let x = seeded(vec![3, 4], 21);
    let mut host = x.zeros_like();
    let mut routed = x.zeros_like();
    CpuBackend.softmax_apply(&x, &mut host).unwrap();
    backend.softmax_apply(&x, &mut routed).unwrap();
    assert_eq!(host, routed);
    assert_eq!(Backend::<f64>::device(&backend), Device::Cpu);
}

#[test]
fn kernel_names_parse_case_insensitively() {
    assert_eq!("BLAS".parse::<GemmKernel>().unwrap(), GemmKernel::Blas);
    assert_eq!("asm".parse::<GemmKernel>().unwrap(), GemmKernel::Asm);
    assert!(matches!(
        "cublas".parse::<GemmKernel>(),
        Err(Error::UnsupportedKernel(name)) if name == "cublas"
    ));
}
