use briny_kernels::backend::{Device, get_default_device, set_default_device};
use briny_kernels::config::{BackendConfig, NetworkConfig};
use briny_kernels::error::Error;
use briny_kernels::modelio::{load_tensors, save_tensors};
use briny_kernels::ops::dispatch::DispatchBackend;
use briny_kernels::tensors::Tensor;

#[test]
fn test_bpat_save_and_load() {
    let path = std::env::temp_dir().join(format!("briny_kernels_core_{}.bpat", std::process::id()));
    let a = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = Tensor::new(vec![1, 4], vec![7.0, 8.0, 9.0, 10.0]);

    save_tensors(&path, &[&a, &b]).unwrap();
    let loaded: Vec<Tensor<f64>> = load_tensors(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(loaded, vec![a, b]);
}

#[test]
fn test_missing_snapshot_is_io_error() {
    let err = load_tensors::<f32>("/nonexistent/briny_kernels.bpat").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_device_names() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("GPU".parse::<Device>().unwrap(), Device::Wgpu);
    assert!(matches!("tpu".parse::<Device>(), Err(Error::UnknownDevice(_))));
}

#[test]
fn test_default_device_round_trip() {
    // the only test in this binary touching the global default
    set_default_device(Device::Cpu);
    assert_eq!(get_default_device(), Device::Cpu);
    assert_eq!(DispatchBackend::default().selected(), Device::Cpu);

    let cfg = BackendConfig::from_json(r#"{"device":"cpu"}"#).unwrap();
    cfg.install();
    assert_eq!(get_default_device(), Device::Cpu);
}

#[cfg(not(feature = "wgpu"))]
#[test]
fn test_wgpu_request_downgrades_without_feature() {
    assert_eq!(DispatchBackend::new(Device::Wgpu).selected(), Device::Cpu);
}

#[test]
fn test_malformed_config_is_config_error() {
    let err = NetworkConfig::from_json("{ not json").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
