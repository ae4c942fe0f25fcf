//! Buffer upload, dispatch and read-back for a single kernel launch.
//!
//! Every shader shares one bind group layout:
//!
//! | binding | contents                         |
//! |---------|----------------------------------|
//! | 0       | uniform [`Params`]               |
//! | 1       | read-only storage `a`            |
//! | 2       | read-only storage `b`            |
//! | 3       | read-write storage `out`         |
//!
//! `out` is uploaded before the dispatch, so in-place kernels see its
//! previous contents, and is copied back into the caller's slice afterwards.
//! A launch blocks until the queue has drained.

use super::{GpuContext, GpuFailure};
use wgpu::util::DeviceExt;

/// Uniform block shared by every kernel: eight words and four scalars.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Params {
    pub u: [u32; 8],
    pub s: [f32; 4],
}

impl Params {
    fn to_bytes(self) -> Vec<u8> {
        self.u
            .iter()
            .flat_map(|x| x.to_le_bytes())
            .chain(self.s.iter().flat_map(|x| x.to_le_bytes()))
            .collect()
    }
}

fn f32_bytes(data: &[f32]) -> Vec<u8> {
    data.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn read_f32s(bytes: &[u8], out: &mut [f32]) -> Result<(), GpuFailure> {
    if bytes.len() != out.len() * 4 {
        return Err(GpuFailure::from(format!(
            "read-back returned {} bytes, expected {}",
            bytes.len(),
            out.len() * 4
        )));
    }
    for (o, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *o = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(())
}

/// Workgroups needed to cover `len` invocations, `per_group` at a time.
pub(crate) fn groups(ctx: &GpuContext, len: usize, per_group: usize) -> Result<u32, GpuFailure> {
    let count = len.div_ceil(per_group);
    let limit = ctx.device.limits().max_compute_workgroups_per_dimension;
    u32::try_from(count)
        .ok()
        .filter(|&c| c <= limit)
        .ok_or_else(|| GpuFailure::from(format!("{count} workgroups exceed the device limit of {limit}")))
}

/// Converts a host extent into a shader word.
pub(crate) fn word(x: usize) -> Result<u32, GpuFailure> {
    u32::try_from(x).map_err(|_| GpuFailure::from(format!("extent {x} does not fit in 32 bits")))
}

/// One compute dispatch.
pub(crate) struct Launch<'a> {
    pub label: &'static str,
    pub pipeline: &'a wgpu::ComputePipeline,
    pub params: Params,
    pub a: &'a [f32],
    pub b: &'a [f32],
    pub groups: (u32, u32),
}

impl Launch<'_> {
    /// Runs the dispatch with `out` bound read-write and copies the result back.
    pub(crate) fn run(self, ctx: &GpuContext, out: &mut [f32]) -> Result<(), GpuFailure> {
        if out.is_empty() {
            return Ok(());
        }
        tracing::trace!(kernel = self.label, groups = ?self.groups, len = out.len(), "gpu launch");

        let device = &ctx.device;
        let queue = &ctx.queue;

        let storage = |label: &'static str, data: &[f32]| {
            // zero-sized storage bindings are invalid
            let contents = if data.is_empty() { vec![0u8; 4] } else { f32_bytes(data) };
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &contents,
                usage: wgpu::BufferUsages::STORAGE,
            })
        };

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("params"),
            contents: &self.params.to_bytes(),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let a_buffer = storage("a", self.a);
        let b_buffer = storage("b", self.b);
        let out_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("out"),
            contents: &f32_bytes(out),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &ctx.pipelines.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: a_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: b_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: out_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(self.label),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(self.label),
                timestamp_writes: None,
            });
            pass.set_pipeline(self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(self.groups.0, self.groups.1, 1);
        }

        let size = (out.len() * 4) as u64;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(&out_buffer, 0, &staging, 0, size);
        queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuFailure::from(format!("device poll failed: {e}")))?;
        rx.recv()
            .map_err(|_| GpuFailure::from("mapping callback dropped"))?
            .map_err(|e| GpuFailure::from(format!("buffer mapping failed: {e}")))?;

        {
            let data = slice.get_mapped_range();
            read_f32s(&data, out)?;
        }
        staging.unmap();
        Ok(())
    }
}
