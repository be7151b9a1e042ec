// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end pipeline scenarios over the headless recording backend:
//! upload-before-draw ordering, command skipping, clear-once tracking,
//! state-cache elision, deferred destruction, and screenshot output.

use merle_core::math::{Extent2D, LinearRgba, Region2D};
use merle_core::renderer::{
    BackendOp, BlendStateHandle, DrawCommand, DrawMode, HeadlessBackend, IndexFormat,
    MeshBufferHandle, RenderError, Renderer, RendererSettings, ShaderHandle, TextureOptions,
    VertexAttributes, BLEND_ALPHA, BLEND_NO_BLEND, SHADER_COLOR, SHADER_TEXTURE,
    TEXTURE_WHITE_PIXEL,
};

fn renderer() -> Renderer<HeadlessBackend> {
    Renderer::new(HeadlessBackend::new(), RendererSettings::default()).unwrap()
}

/// Creates a synced-ready mesh (index + vertex buffer pair).
fn make_mesh(renderer: &Renderer<HeadlessBackend>) -> MeshBufferHandle {
    let index_buffer = renderer.create_buffer();
    renderer
        .buffer(index_buffer)
        .unwrap()
        .init_from_bytes(
            bytemuck::cast_slice(&[0u16, 1, 2]),
            merle_core::renderer::BufferUsage::Index,
            false,
        )
        .unwrap();

    let vertex_buffer = renderer.create_buffer();
    renderer
        .buffer(vertex_buffer)
        .unwrap()
        .init_from_bytes(&[0u8; 48], merle_core::renderer::BufferUsage::Vertex, false)
        .unwrap();

    let mesh = renderer.create_mesh_buffer();
    renderer
        .mesh_buffer(mesh)
        .unwrap()
        .init(
            index_buffer,
            IndexFormat::Uint16,
            vertex_buffer,
            VertexAttributes::POSITION | VertexAttributes::COLOR,
        )
        .unwrap();
    mesh
}

fn make_command(
    blend: BlendStateHandle,
    shader: ShaderHandle,
    mesh: MeshBufferHandle,
    index_count: u32,
) -> DrawCommand {
    DrawCommand::new(
        blend,
        shader,
        mesh,
        DrawMode::TriangleList,
        index_count,
        Region2D::new(0, 0, 800, 600),
    )
}

#[test]
fn default_resources_are_registered() {
    let renderer = renderer();
    assert!(renderer.named_shader(SHADER_TEXTURE).is_some());
    assert!(renderer.named_shader(SHADER_COLOR).is_some());
    for name in [BLEND_NO_BLEND, "add", "multiply", BLEND_ALPHA] {
        assert!(renderer.named_blend_state(name).is_some(), "missing {name}");
    }
    assert!(renderer.named_texture(TEXTURE_WHITE_PIXEL).is_some());
}

#[test]
fn white_pixel_with_mipmaps_has_one_level_and_syncs_clean() {
    let mut renderer = renderer();
    let texture = renderer.create_texture();
    renderer
        .texture(texture)
        .unwrap()
        .init_from_bytes(&[255, 255, 255, 255], Extent2D::new(1, 1), false, true)
        .unwrap();

    renderer.process().unwrap();

    let resource = renderer.texture(texture).unwrap();
    resource.read_committed(|data| {
        assert!(data.mip_levels_generated);
        assert_eq!(data.levels.len(), 1, "no sub-1px mip chain");
    });
    assert!(!resource.awaiting_sync(), "dirty cleared after upload");
}

#[test]
fn upload_is_idempotent_without_mutation() {
    let mut renderer = renderer();
    let texture = renderer.create_texture();
    renderer
        .texture(texture)
        .unwrap()
        .init_from_bytes(&[1, 2, 3, 255], Extent2D::new(1, 1), false, false)
        .unwrap();

    renderer.process().unwrap();
    renderer.process().unwrap();
    renderer.process().unwrap();

    assert_eq!(renderer.backend().sync_count(texture.raw()), 1);
}

#[test]
fn empty_queue_still_clears_and_presents() {
    let mut renderer = renderer();
    renderer.process().unwrap();
    renderer.backend_mut().take_ops();

    renderer.draw().unwrap();

    let ops = renderer.backend_mut().take_ops();
    assert!(matches!(ops.first(), Some(BackendOp::BeginFrame)));
    assert!(ops
        .iter()
        .any(|op| matches!(op, BackendOp::Clear { color: Some(_), .. })));
    assert!(matches!(ops.last(), Some(BackendOp::Present)));
}

#[test]
fn draw_commands_execute_in_submission_order() {
    let mut renderer = renderer();
    let blend = renderer.named_blend_state(BLEND_NO_BLEND).unwrap();
    let shader = renderer.named_shader(SHADER_COLOR).unwrap();
    let mesh_a = make_mesh(&renderer);
    let mesh_b = make_mesh(&renderer);

    renderer.process().unwrap();
    renderer.backend_mut().take_ops();

    renderer.queue_command(make_command(blend, shader, mesh_a, 3));
    renderer.queue_command(make_command(blend, shader, mesh_b, 6));
    renderer.draw().unwrap();

    let ops = renderer.backend_mut().take_ops();
    let draws: Vec<u32> = ops
        .iter()
        .filter_map(|op| match op {
            BackendOp::DrawIndexed { index_count, .. } => Some(*index_count),
            _ => None,
        })
        .collect();
    assert_eq!(draws, vec![3, 6]);

    // Every backend call attributable to the first command precedes the
    // second command's mesh bind.
    let first_draw = ops
        .iter()
        .position(|op| matches!(op, BackendOp::DrawIndexed { index_count: 3, .. }))
        .unwrap();
    let second_mesh_bind = ops
        .iter()
        .position(|op| matches!(op, BackendOp::BindMeshBuffer(handle) if *handle == mesh_b.raw()))
        .unwrap();
    assert!(first_draw < second_mesh_bind);
}

#[test]
fn redundant_state_is_elided_between_identical_commands() {
    let mut renderer = renderer();
    let blend = renderer.named_blend_state(BLEND_ALPHA).unwrap();
    let shader = renderer.named_shader(SHADER_COLOR).unwrap();
    let mesh = make_mesh(&renderer);

    renderer.process().unwrap();
    renderer.backend_mut().take_ops();

    renderer.queue_command(make_command(blend, shader, mesh, 3));
    renderer.queue_command(make_command(blend, shader, mesh, 3));
    renderer.draw().unwrap();

    let ops = renderer.backend_mut().take_ops();
    let first_draw = ops
        .iter()
        .position(|op| matches!(op, BackendOp::DrawIndexed { .. }))
        .unwrap();

    // Between the two draws nothing needs rebinding: the identical second
    // command reaches the backend as a bare draw call.
    assert_eq!(
        &ops[first_draw + 1..],
        &[
            BackendOp::DrawIndexed {
                mode: DrawMode::TriangleList,
                index_count: 3,
                start_index: 0
            },
            BackendOp::Present,
        ]
    );

    let program_binds = ops
        .iter()
        .filter(|op| matches!(op, BackendOp::BindProgram(_)))
        .count();
    assert_eq!(program_binds, 1);
}

#[test]
fn stale_shader_skips_command_without_touching_state() {
    let mut renderer = renderer();
    let blend = renderer.named_blend_state(BLEND_NO_BLEND).unwrap();
    let shader = renderer.named_shader(SHADER_COLOR).unwrap();
    let mesh = make_mesh(&renderer);

    // A shader that is destroyed before the frame leaves a stale handle.
    let dead_shader = renderer.create_shader();
    renderer.destroy_shader(dead_shader);

    renderer.process().unwrap();
    renderer.backend_mut().take_ops();

    renderer.queue_command(make_command(blend, dead_shader, mesh, 9));
    renderer.queue_command(make_command(blend, shader, mesh, 3));
    renderer.draw().unwrap();

    let ops = renderer.backend_mut().take_ops();

    // The invalid command issued nothing.
    assert!(!ops
        .iter()
        .any(|op| matches!(op, BackendOp::DrawIndexed { index_count: 9, .. })));
    assert!(!ops
        .iter()
        .any(|op| matches!(op, BackendOp::BindBlendState(handle) if *handle == dead_shader.raw())));

    // The valid command still performed its full first-time binding,
    // proving the skip left the state cache untouched.
    assert!(ops
        .iter()
        .any(|op| matches!(op, BackendOp::BindProgram(handle) if *handle == shader.raw())));
    assert!(ops
        .iter()
        .any(|op| matches!(op, BackendOp::DrawIndexed { index_count: 3, .. })));
}

#[test]
fn render_target_clears_once_per_frame() {
    let mut renderer = renderer();
    let blend = renderer.named_blend_state(BLEND_NO_BLEND).unwrap();
    let shader = renderer.named_shader(SHADER_COLOR).unwrap();
    let mesh = make_mesh(&renderer);

    let target = renderer.create_texture();
    renderer
        .texture(target)
        .unwrap()
        .init(
            Extent2D::new(256, 256),
            TextureOptions {
                render_target: true,
                ..Default::default()
            },
        )
        .unwrap();
    renderer.texture(target).unwrap().set_clear_color(LinearRgba::WHITE);

    renderer.process().unwrap();
    renderer.backend_mut().take_ops();

    for _ in 0..3 {
        let mut command = make_command(blend, shader, mesh, 3);
        command.render_target = Some(target);
        renderer.queue_command(command);
    }
    renderer.draw().unwrap();

    let ops = renderer.backend_mut().take_ops();
    let clears = ops
        .iter()
        .filter(|op| matches!(op, BackendOp::Clear { .. }))
        .count();
    assert_eq!(clears, 1, "K commands on one target clear it once");

    // A new frame clears the target again.
    let mut command = make_command(blend, shader, mesh, 3);
    command.render_target = Some(target);
    renderer.queue_command(command);
    renderer.draw().unwrap();

    let ops = renderer.backend_mut().take_ops();
    assert_eq!(
        ops.iter()
            .filter(|op| matches!(op, BackendOp::Clear { .. }))
            .count(),
        1
    );
}

#[test]
fn failed_backend_sync_skips_commands_until_healed() {
    let mut renderer = renderer();
    let blend = renderer.named_blend_state(BLEND_NO_BLEND).unwrap();
    let mesh = make_mesh(&renderer);

    let shader = renderer.create_shader();
    renderer
        .shader(shader)
        .unwrap()
        .init_from_bytes(
            b"ps",
            b"vs",
            VertexAttributes::POSITION | VertexAttributes::COLOR,
            Vec::new(),
            Vec::new(),
        )
        .unwrap();

    renderer.backend_mut().fail_syncs_for(shader.raw());
    renderer.process().unwrap();

    // The shader stayed dirty and its commands are skipped.
    assert!(renderer.shader(shader).unwrap().awaiting_sync());
    renderer.queue_command(make_command(blend, shader, mesh, 3));
    renderer.draw().unwrap();
    let ops = renderer.backend_mut().take_ops();
    assert!(!ops.iter().any(|op| matches!(op, BackendOp::DrawIndexed { .. })));

    // Recovery is caller-driven: the next frame retries the sync.
    renderer.backend_mut().heal_syncs_for(shader.raw());
    renderer.process().unwrap();
    assert!(!renderer.shader(shader).unwrap().awaiting_sync());

    renderer.queue_command(make_command(blend, shader, mesh, 3));
    renderer.draw().unwrap();
    let ops = renderer.backend_mut().take_ops();
    assert!(ops.iter().any(|op| matches!(op, BackendOp::DrawIndexed { .. })));
}

#[test]
fn too_many_constants_abort_the_frame() {
    let mut renderer = renderer();
    let blend = renderer.named_blend_state(BLEND_NO_BLEND).unwrap();
    // The color preset declares one constant per stage.
    let shader = renderer.named_shader(SHADER_COLOR).unwrap();
    let mesh = make_mesh(&renderer);

    renderer.process().unwrap();

    let mut command = make_command(blend, shader, mesh, 3);
    command.pixel_shader_constants = vec![vec![1.0; 4], vec![2.0; 4]];
    renderer.queue_command(command);

    match renderer.draw() {
        Err(RenderError::TooManyConstants { supplied, declared }) => {
            assert_eq!(supplied, 2);
            assert_eq!(declared, 1);
        }
        other => panic!("expected TooManyConstants, got {other:?}"),
    }
}

#[test]
fn retired_resources_are_freed_after_the_frame_completes() {
    let mut renderer = renderer();
    let texture = renderer.create_texture();
    renderer
        .texture(texture)
        .unwrap()
        .init_from_bytes(&[9, 9, 9, 255], Extent2D::new(1, 1), false, false)
        .unwrap();

    renderer.process().unwrap();

    assert!(renderer.destroy_texture(texture));
    // Stale immediately (Zombie state).
    assert!(renderer.texture(texture).is_none());

    // The frame the texture was retired in has not completed yet.
    renderer.process().unwrap();
    assert!(!renderer
        .backend_mut()
        .take_ops()
        .iter()
        .any(|op| matches!(op, BackendOp::FreeResource(_))));

    renderer.draw().unwrap();
    renderer.process().unwrap();

    let ops = renderer.backend_mut().take_ops();
    assert!(ops
        .iter()
        .any(|op| matches!(op, BackendOp::FreeResource(handle) if *handle == texture.raw())));
}

#[test]
fn resize_is_applied_by_process_once() {
    let mut renderer = renderer();
    renderer.process().unwrap();
    renderer.backend_mut().take_ops();

    renderer.set_size(Extent2D::new(1024, 768));
    renderer.process().unwrap();
    assert_eq!(renderer.size(), Extent2D::new(1024, 768));

    let ops = renderer.backend_mut().take_ops();
    assert!(ops
        .iter()
        .any(|op| matches!(op, BackendOp::ResizeFrameBuffer(size) if size.width == 1024)));

    // Idempotent: nothing staged, nothing issued.
    renderer.process().unwrap();
    assert!(renderer.backend_mut().take_ops().is_empty());
}

#[test]
fn unsupported_multisampling_falls_back_to_one_sample() {
    let caps = merle_core::renderer::DeviceCapabilities {
        multisampling: false,
        ..Default::default()
    };
    let renderer = Renderer::new(
        HeadlessBackend::with_capabilities(caps),
        RendererSettings {
            sample_count: 4,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(renderer.sample_count(), 1);
}

#[test]
fn screenshot_is_vertically_flipped_png() {
    let mut renderer = Renderer::new(
        HeadlessBackend::new(),
        RendererSettings {
            size: Extent2D::new(4, 2),
            ..Default::default()
        },
    )
    .unwrap();
    renderer.process().unwrap();

    // Paint row 0 red and row 1 green in GPU order (bottom-left origin).
    {
        let frame = renderer.backend_mut().frame_buffer_mut();
        for (index, pixel) in frame.chunks_exact_mut(4).enumerate() {
            if index < 4 {
                pixel.copy_from_slice(&[255, 0, 0, 255]);
            } else {
                pixel.copy_from_slice(&[0, 255, 0, 255]);
            }
        }
    }

    let path = std::env::temp_dir().join("merle_screenshot_flip_test.png");
    renderer.generate_screenshot(&path).unwrap();

    let decoder = png::Decoder::new(std::io::BufReader::new(std::fs::File::open(&path).unwrap()));
    let mut reader = decoder.read_info().unwrap();
    let mut pixels = vec![0u8; 4 * 2 * 4];
    let info = reader.next_frame(&mut pixels).unwrap();
    assert_eq!((info.width, info.height), (4, 2));

    // The GPU's top row (green) is the image's first row.
    assert_eq!(&pixels[..4], &[0, 255, 0, 255]);
    assert_eq!(&pixels[16..20], &[255, 0, 0, 255]);

    std::fs::remove_file(&path).ok();
}
