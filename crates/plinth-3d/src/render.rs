use crate::depth::create_depth;
use crate::model::{Model, create_model_ubo};
use crate::pipeline::{Layouts, create_pipeline};
use glam::Mat4;
use std::sync::Arc;
use wgpu::*;

pub struct Renderer3D {
    pub render_pipeline: RenderPipeline,
    pub depth_view: TextureView,
    pub depth_tex: Texture,
    pub camera_bg: BindGroup,
    pub camera_buf: Buffer,
    pub model_bg: BindGroup,
    pub model_buf: Buffer,
    pub model: Arc<Model>,
    base_xform: Mat4,
}

impl Renderer3D {
    pub fn new(
        device: &Device,
        surface_format: TextureFormat,
        width: u32,
        height: u32,
        model: Arc<Model>,
        layouts: &Layouts,
    ) -> Self {
        let (depth_view, depth_tex) = create_depth(device, width, height);

        let (render_pipeline, camera_bg, camera_buf) =
            create_pipeline(device, surface_format, layouts);

        let base_xform = model.recommended_xform;
        let (model_buf, model_bg) = create_model_ubo(device, &layouts.model_bgl, base_xform);

        Self {
            render_pipeline,
            depth_view,
            depth_tex,
            camera_bg,
            camera_buf,
            model_bg,
            model_buf,
            model,
            base_xform,
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        let (dv, dt) = create_depth(device, width, height);
        self.depth_view = dv;
        self.depth_tex = dt;
    }

    /// Applies the scene-level scale on top of the model's normalizing
    /// transform. NaN components are written as-is and blank the frame until
    /// the input is corrected.
    pub fn set_scene_scale(&self, queue: &Queue, scale_matrix: Mat4) {
        let m = (scale_matrix * self.base_xform).to_cols_array();
        queue.write_buffer(&self.model_buf, 0, bytemuck::cast_slice(&m));
    }

    pub fn render(&self, encoder: &mut CommandEncoder, target_view: &TextureView) {
        let mut r_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::BLACK),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        r_pass.set_pipeline(&self.render_pipeline);
        r_pass.set_bind_group(0, &self.camera_bg, &[]);
        r_pass.set_bind_group(1, &self.model_bg, &[]);

        for mesh in &self.model.meshes {
            let Some(idx) = clamped_material_index(mesh.material_id, self.model.materials.len())
            else {
                continue;
            };
            let mat = &self.model.materials[idx];
            r_pass.set_bind_group(2, &mat.bind_group, &[]);
            r_pass.set_vertex_buffer(0, mesh.vbuf.slice(..));
            r_pass.set_index_buffer(mesh.ibuf.slice(..), IndexFormat::Uint32);
            r_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

/// Clamps a mesh's material slot to the material table. A stale index falls
/// back to the last material; with no materials at all the mesh is skipped
/// rather than drawn with a dangling bind group.
fn clamped_material_index(material_id: usize, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else {
        Some(material_id.min(len - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::clamped_material_index;

    #[test]
    fn material_index_clamps_instead_of_underflowing() {
        assert_eq!(clamped_material_index(0, 0), None);
        assert_eq!(clamped_material_index(7, 0), None);
        assert_eq!(clamped_material_index(0, 3), Some(0));
        assert_eq!(clamped_material_index(2, 3), Some(2));
        assert_eq!(clamped_material_index(9, 3), Some(2));
    }
}
