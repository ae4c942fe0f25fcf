//! Accelerator kernels checked against the host. Every test returns early
//! when no adapter is present.
#![cfg(feature = "wgpu")]

use approx::assert_abs_diff_eq;
use briny_kernels::backend::{Backend, Device, GemmKernel};
use briny_kernels::ops::cpu::CpuBackend;
use briny_kernels::ops::dispatch::DispatchBackend;
use briny_kernels::ops::wgpu::{WgpuBackend, is_available};
use briny_kernels::random::RngState;
use briny_kernels::tensor;
use briny_kernels::tensors::{Layout, Tensor};

fn gpu() -> Option<WgpuBackend> {
    if !is_available() {
        eprintln!("no GPU adapter, skipping");
        return None;
    }
    WgpuBackend::new().ok()
}

fn random(shape: Vec<usize>, seed: u64) -> Tensor<f32> {
    let mut t = Tensor::zeros(shape);
    CpuBackend
        .uniform_distribution(-1.0, 1.0, &mut t, &mut RngState::seeded(seed))
        .unwrap();
    t
}

fn assert_close(a: &Tensor<f32>, b: &Tensor<f32>, eps: f32) {
    assert_eq!(a.shape(), b.shape());
    for (x, y) in a.data().iter().zip(b.data()) {
        assert_abs_diff_eq!(x, y, epsilon = eps);
    }
}

#[test]
fn known_product_on_both_kernels() {
    let Some(gpu) = gpu() else { return };
    let a = tensor!([[1.0f32, 2.0], [3.0, 4.0]]);
    let b = tensor!([[5.0f32, 6.0], [7.0, 8.0]]);
    for kernel in [GemmKernel::Blas, GemmKernel::Asm] {
        let mut c = Tensor::zeros(vec![2, 2]);
        gpu.matrix_dot(&a, &b, false, false, 1.0, 0.0, &mut c, kernel)
            .unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0], "kernel {kernel}");
    }
}

#[test]
fn gemm_matches_host_with_transposes() {
    let Some(gpu) = gpu() else { return };
    let a = random(vec![40, 23], 1).with_layout(Layout::ColumnMajor);
    let b = random(vec![19, 23], 2);
    for kernel in [GemmKernel::Blas, GemmKernel::Asm] {
        let mut host = Tensor::full(vec![40, 19], 1.0);
        let mut dev = host.clone();
        CpuBackend
            .matrix_dot(&a, &b, false, true, 0.5, 2.0, &mut host, kernel)
            .unwrap();
        gpu.matrix_dot(&a, &b, false, true, 0.5, 2.0, &mut dev, kernel)
            .unwrap();
        assert_close(&host, &dev, 1e-4);
    }
}

#[test]
fn activations_match_host() {
    let Some(gpu) = gpu() else { return };
    let x = random(vec![16, 10], 3);
    let mut host = x.zeros_like();
    let mut dev = x.zeros_like();

    CpuBackend.rectlin_apply(&x, 0.1, &mut host).unwrap();
    gpu.rectlin_apply(&x, 0.1, &mut dev).unwrap();
    assert_close(&host, &dev, 1e-6);

    CpuBackend.logistic_apply(&x, &mut host).unwrap();
    gpu.logistic_apply(&x, &mut dev).unwrap();
    assert_close(&host, &dev, 1e-5);

    CpuBackend.softmax_apply(&x, &mut host).unwrap();
    gpu.softmax_apply(&x, &mut dev).unwrap();
    assert_close(&host, &dev, 1e-5);

    let mut host_g = random(vec![16, 10], 4);
    let mut dev_g = host_g.clone();
    CpuBackend.softmax_derivative(&x, &mut host_g, false).unwrap();
    gpu.softmax_derivative(&x, &mut dev_g, false).unwrap();
    assert_close(&host_g, &dev_g, 1e-5);
}

#[test]
fn rectlin_derivative_uses_slope_at_and_below_zero() {
    let Some(gpu) = gpu() else { return };
    let x = tensor!([-2.0f32, 0.0, 3.0]);
    let mut g = Tensor::full(vec![3], 1.0);
    gpu.rectlin_derivative(&x, 0.25, &mut g).unwrap();
    assert_close(&g, &tensor!([0.25f32, 0.25, 1.0]), 1e-7);
}

#[test]
fn losses_and_bias_match_host() {
    let Some(gpu) = gpu() else { return };
    let mut x = random(vec![8, 5], 5);
    CpuBackend.logistic_apply(&x.clone(), &mut x).unwrap();
    let t = Tensor::full(vec![8, 5], 0.5);

    let host = CpuBackend.cross_entropy_binary_apply(&x, &t).unwrap();
    let dev = gpu.cross_entropy_binary_apply(&x, &t).unwrap();
    assert_abs_diff_eq!(host, dev, epsilon = 1e-4);

    let host = CpuBackend.square_mean_apply(&x, &t).unwrap();
    let dev = gpu.square_mean_apply(&x, &t).unwrap();
    assert_abs_diff_eq!(host, dev, epsilon = 1e-5);

    let bias = random(vec![5], 6);
    let mut host = x.zeros_like();
    let mut dev = x.zeros_like();
    CpuBackend.bias_forward(&x, &bias, &mut host).unwrap();
    gpu.bias_forward(&x, &bias, &mut dev).unwrap();
    assert_close(&host, &dev, 1e-6);

    let mut host = Tensor::zeros(vec![5]);
    let mut dev = Tensor::zeros(vec![5]);
    CpuBackend.bias_backward_update(&x, &mut host).unwrap();
    gpu.bias_backward_update(&x, &mut dev).unwrap();
    assert_close(&host, &dev, 1e-5);
}

#[test]
fn gradient_descent_matches_host() {
    let Some(gpu) = gpu() else { return };
    let (mut hw, mut hg, mut hv) = (random(vec![64], 7), random(vec![64], 8), random(vec![64], 9));
    let (mut dw, mut dg, mut dv) = (hw.clone(), hg.clone(), hv.clone());
    CpuBackend
        .gradient_descent(0.9, 0.05, 0.001, 4, &mut hw, &mut hg, &mut hv)
        .unwrap();
    gpu.gradient_descent(0.9, 0.05, 0.001, 4, &mut dw, &mut dg, &mut dv)
        .unwrap();
    assert_close(&hw, &dw, 1e-6);
    assert_close(&hv, &dv, 1e-6);
}

#[test]
fn classify_matches_host() {
    let Some(gpu) = gpu() else { return };
    let y = tensor!([[0.1f32, 0.9], [0.8, 0.2], [0.5, 0.5]]);
    let t = tensor!([[0.0f32, 1.0], [0.0, 1.0], [1.0, 0.0]]);
    assert_eq!(
        gpu.evaluate_classify(&y, &t).unwrap(),
        CpuBackend.evaluate_classify(&y, &t).unwrap()
    );
}

#[test]
fn dispatch_selects_gpu_when_present() {
    if !is_available() {
        return;
    }
    assert_eq!(DispatchBackend::new(Device::Wgpu).selected(), Device::Wgpu);
}
