use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use wgpu::{BindGroup, BindGroupLayout, Buffer, Device};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

pub struct GpuMesh {
    pub vbuf: Buffer,
    pub ibuf: Buffer,
    pub index_count: u32,
    pub material_id: usize,
    // Fixed at load time for the whole node tree; there is no shadow pass
    // that re-applies them later.
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

pub struct Material {
    pub bind_group: BindGroup,
    pub base_color: [f32; 4],
}

pub struct Model {
    pub name: Option<String>,
    pub meshes: Vec<GpuMesh>,
    pub materials: Vec<Material>,
    /// Normalizing transform: recenters the mesh on the origin and scales it
    /// to unit extent so it frames inside the viewer's fixed frustum.
    pub recommended_xform: Mat4,
}

pub fn create_model_ubo(device: &Device, model_bgl: &BindGroupLayout, xform: Mat4) -> (Buffer, BindGroup) {
    let buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("model_ubo"),
        contents: bytemuck::cast_slice(&xform.to_cols_array()),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("model_bg"),
        layout: model_bgl,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buf.as_entire_binding(),
        }],
    });
    (buf, bg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_matches_attributes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(Vertex::layout().array_stride, 32);
        assert_eq!(Vertex::layout().attributes.len(), 3);
    }
}
