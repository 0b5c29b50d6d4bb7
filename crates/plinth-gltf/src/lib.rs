use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use plinth_3d::{GpuMesh, Material, Model, Vertex};
use plinth_scene::Scene;
use std::path::Path;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use wgpu::{BindGroupLayout, Device, Queue};

/// Shadow flags applied to the root and, recursively, every mesh-bearing
/// descendant at load time. Any combination is legal.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    pub receive_shadow: bool,
    pub cast_shadow: bool,
}

/// Imports a glTF asset, uploads its geometry and materials, attaches the
/// root to the given scene and returns it.
///
/// The root is name-tagged from the file stem and pinned to the origin by a
/// normalizing transform. Attachment is insert-only; loading the same path
/// twice yields two independent roots. On failure the error is returned and
/// the scene is left untouched.
pub async fn load_gltf_model(
    device: &Device,
    queue: &Queue,
    material_bgl: &BindGroupLayout,
    scene: &mut Scene,
    path: &Path,
    options: LoadOptions,
) -> Result<Arc<Model>> {
    let (doc, buffers, images) = gltf::import(path)
        .with_context(|| format!("failed to import glTF asset {}", path.display()))?;

    let mut materials = Vec::new();
    for material in doc.materials() {
        materials.push(upload_material(device, queue, material_bgl, &material, &images)?);
    }
    if materials.is_empty() {
        materials.push(default_material(device, queue, material_bgl));
    }

    let mut meshes = Vec::new();
    let mut bounds = Bounds::empty();
    for gltf_scene in doc.scenes() {
        for node in gltf_scene.nodes() {
            collect_node(
                device,
                &node,
                &buffers,
                Mat4::IDENTITY,
                options,
                &mut meshes,
                &mut bounds,
            )?;
        }
    }
    anyhow::ensure!(
        !meshes.is_empty(),
        "asset {} contains no mesh geometry",
        path.display()
    );

    let model = Arc::new(Model {
        name: path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string),
        meshes,
        materials,
        recommended_xform: normalizing_transform(bounds.min, bounds.max),
    });
    scene.add_model(Arc::clone(&model), Mat4::IDENTITY);
    Ok(model)
}

struct Bounds {
    min: Vec3,
    max: Vec3,
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    fn merge(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }
}

/// Recenters the mesh bounds on the origin in X/Z, rests the base on Y = 0
/// and scales the longest extent to 1, so arbitrary assets frame inside the
/// viewer's fixed orthographic frustum.
pub fn normalizing_transform(min: Vec3, max: Vec3) -> Mat4 {
    let center = (min + max) * 0.5;
    let extent = (max - min).max_element().max(1e-6);
    Mat4::from_scale(Vec3::splat(1.0 / extent))
        * Mat4::from_translation(Vec3::new(-center.x, -min.y, -center.z))
}

fn collect_node(
    device: &Device,
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent_xform: Mat4,
    options: LoadOptions,
    meshes: &mut Vec<GpuMesh>,
    bounds: &mut Bounds,
) -> Result<()> {
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let global = parent_xform * local;

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .context("mesh primitive has no positions")?
                .collect();
            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

            // Node transforms are baked into the vertices; the model keeps a
            // single transform slot for the scene-level scale.
            let normal_xform = global.inverse().transpose();
            let vertices: Vec<Vertex> = positions
                .iter()
                .zip(normals.iter())
                .zip(uvs.iter())
                .map(|((p, n), uv)| {
                    let pos = global.transform_point3(Vec3::from_array(*p));
                    bounds.merge(pos);
                    let normal = normal_xform
                        .transform_vector3(Vec3::from_array(*n))
                        .normalize_or_zero();
                    Vertex {
                        position: pos.to_array(),
                        normal: normal.to_array(),
                        uv: *uv,
                    }
                })
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(iter) => iter.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };

            let vbuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: mesh.name(),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let ibuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: mesh.name(),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });

            meshes.push(GpuMesh {
                vbuf,
                ibuf,
                index_count: indices.len() as u32,
                material_id: primitive.material().index().unwrap_or(0),
                cast_shadow: options.cast_shadow,
                receive_shadow: options.receive_shadow,
            });
        }
    }

    for child in node.children() {
        collect_node(device, &child, buffers, global, options, meshes, bounds)?;
    }

    Ok(())
}

fn upload_material(
    device: &Device,
    queue: &Queue,
    material_bgl: &BindGroupLayout,
    material: &gltf::Material,
    images: &[gltf::image::Data],
) -> Result<Material> {
    let pbr = material.pbr_metallic_roughness();
    let base_color = pbr.base_color_factor();

    let (pixels, width, height) = match pbr.base_color_texture() {
        Some(info) => {
            let data = &images[info.texture().source().index()];
            let rgba = rgba_pixels(data.format, data.width, data.height, &data.pixels)?;
            (rgba, data.width, data.height)
        }
        None => (vec![255u8; 4], 1, 1),
    };

    Ok(build_material(
        device,
        queue,
        material_bgl,
        base_color,
        &pixels,
        width,
        height,
    ))
}

fn default_material(device: &Device, queue: &Queue, material_bgl: &BindGroupLayout) -> Material {
    build_material(
        device,
        queue,
        material_bgl,
        [1.0, 1.0, 1.0, 1.0],
        &[255u8; 4],
        1,
        1,
    )
}

fn build_material(
    device: &Device,
    queue: &Queue,
    material_bgl: &BindGroupLayout,
    base_color: [f32; 4],
    rgba_pixels: &[u8],
    width: u32,
    height: u32,
) -> Material {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("base_color_tex"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba_pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("base_color_samp"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    let factor_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("material_factors"),
        contents: bytemuck::cast_slice(&base_color),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("material_bg"),
        layout: material_bgl,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: factor_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    Material {
        bind_group,
        base_color,
    }
}

fn rgba_pixels(
    format: gltf::image::Format,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<Vec<u8>> {
    use gltf::image::Format;
    match format {
        Format::R8G8B8A8 => Ok(pixels.to_vec()),
        Format::R8G8B8 => {
            let rgb = image::RgbImage::from_raw(width, height, pixels.to_vec())
                .context("texture pixel buffer does not match its dimensions")?;
            Ok(image::DynamicImage::ImageRgb8(rgb).to_rgba8().into_raw())
        }
        other => anyhow::bail!("unsupported base color texture format {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizing_transform_fits_unit_extent_at_origin() {
        let min = Vec3::new(-3.0, 2.0, -1.0);
        let max = Vec3::new(5.0, 6.0, 1.0);
        let xform = normalizing_transform(min, max);

        let lo = xform.transform_point3(min);
        let hi = xform.transform_point3(max);

        // Base rests on y = 0, X/Z are centered, longest extent is 1.
        assert!(lo.y.abs() < 1e-5);
        assert!((lo.x + hi.x).abs() < 1e-5);
        assert!((lo.z + hi.z).abs() < 1e-5);
        assert!(((hi.x - lo.x) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalizing_transform_handles_degenerate_bounds() {
        let xform = normalizing_transform(Vec3::ZERO, Vec3::ZERO);
        let p = xform.transform_point3(Vec3::ZERO);
        assert!(p.is_finite());
    }

    #[test]
    fn rgb_textures_gain_an_opaque_alpha_channel() {
        let rgb = vec![10u8, 20, 30, 40, 50, 60];
        let rgba = rgba_pixels(gltf::image::Format::R8G8B8, 2, 1, &rgb).unwrap();
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn rgba_textures_pass_through() {
        let px = vec![1u8, 2, 3, 4];
        let rgba = rgba_pixels(gltf::image::Format::R8G8B8A8, 1, 1, &px).unwrap();
        assert_eq!(rgba, px);
    }

    #[test]
    fn mismatched_pixel_buffer_is_an_error() {
        assert!(rgba_pixels(gltf::image::Format::R8G8B8, 4, 4, &[0u8; 3]).is_err());
    }
}
