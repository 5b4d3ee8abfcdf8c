use std::mem;
use std::slice;
use rust_vrframe_api::utils;
use rust_vrframe_api::{VRAttributeType, VRBufferTarget, VRError, VRGpu, VRPipelineSettings, VRProgram,
                       VRProgramDesc, VRVertexAttribute, VRVertexLayout};

pub const VERTEX_ATTRIBUTE_LOCATION_POSITION: u32 = 0;
pub const VERTEX_ATTRIBUTE_LOCATION_COLOR: u32 = 1;
pub const VERTEX_ATTRIBUTE_LOCATION_UV: u32 = 2;
pub const VERTEX_ATTRIBUTE_LOCATION_TRANSFORM: u32 = 3;

pub const SCENE_MATRICES_BINDING: u32 = 0;

// Two view matrices followed by two projection matrices.
pub const SCENE_MATRICES_SIZE: usize = 4 * 16 * 4;
pub const INSTANCE_TRANSFORM_SIZE: usize = 16 * 4;

// Instances closer than this on every axis overlap.
const MIN_SEPARATION: f32 = 4.0;

const PROGRAM_VERSION: &str = "#version 300 es\n";

const VERTEX_SHADER: &str = "\
#ifndef DISABLE_MULTIVIEW
	#define DISABLE_MULTIVIEW 0
#endif
#define NUM_VIEWS 2
#if defined( GL_OVR_multiview2 ) && ! DISABLE_MULTIVIEW
	#extension GL_OVR_multiview2 : enable
	layout(num_views=NUM_VIEWS) in;
	#define VIEW_ID gl_ViewID_OVR
#else
	uniform lowp int ViewID;
	#define VIEW_ID ViewID
#endif
in vec3 vertexPosition;
in vec4 vertexColor;
in mat4 vertexTransform;
uniform SceneMatrices
{
	uniform mat4 ViewMatrix[NUM_VIEWS];
	uniform mat4 ProjectionMatrix[NUM_VIEWS];
} sm;
out vec4 fragmentColor;
void main()
{
	gl_Position = sm.ProjectionMatrix[VIEW_ID] * ( sm.ViewMatrix[VIEW_ID] * ( vertexTransform * vec4( vertexPosition, 1.0 ) ) );
	fragmentColor = vertexColor;
}
";

const FRAGMENT_SHADER: &str = "\
in lowp vec4 fragmentColor;
out lowp vec4 outColor;
void main()
{
	outColor = fragmentColor;
}
";

const PROGRAM_ATTRIBUTES: [(u32, &str); 4] = [
    (VERTEX_ATTRIBUTE_LOCATION_POSITION, "vertexPosition"),
    (VERTEX_ATTRIBUTE_LOCATION_COLOR, "vertexColor"),
    (VERTEX_ATTRIBUTE_LOCATION_UV, "vertexUv"),
    (VERTEX_ATTRIBUTE_LOCATION_TRANSFORM, "vertexTransform"),
];

const PROGRAM_UNIFORM_BLOCKS: [(u32, &str); 1] = [(SCENE_MATRICES_BINDING, "SceneMatrices")];

const CUBE_POSITIONS: [[i8; 4]; 8] = [
    // top
    [-127, 127, -127, 127], [127, 127, -127, 127], [127, 127, 127, 127], [-127, 127, 127, 127],
    // bottom
    [-127, -127, -127, 127], [-127, -127, 127, 127], [127, -127, 127, 127], [127, -127, -127, 127],
];

const CUBE_COLORS: [[u8; 4]; 8] = [
    [255, 0, 255, 255], [0, 255, 0, 255], [0, 0, 255, 255], [255, 0, 0, 255],
    [0, 0, 255, 255], [0, 255, 0, 255], [255, 0, 255, 255], [255, 0, 0, 255],
];

const CUBE_INDICES: [u16; 36] = [
    0, 2, 1, 2, 0, 3, // top
    4, 6, 5, 6, 4, 7, // bottom
    2, 6, 7, 7, 1, 2, // right
    0, 4, 5, 5, 3, 0, // left
    3, 5, 6, 6, 2, 3, // front
    0, 1, 7, 7, 4, 0, // back
];

// Byte offset of the colors inside the cube vertex buffer.
const CUBE_COLOR_OFFSET: u32 = 8 * 4;

/// Vertex and fragment sources; the multiview switch is a preprocessor
/// define so each variant is compiled separately.
pub fn program_sources(use_multiview: bool) -> (String, String) {
    let define = if use_multiview {
        "#define DISABLE_MULTIVIEW 0\n"
    } else {
        "#define DISABLE_MULTIVIEW 1\n"
    };
    (format!("{}{}{}", PROGRAM_VERSION, define, VERTEX_SHADER),
     format!("{}{}", PROGRAM_VERSION, FRAGMENT_SHADER))
}

fn cube_vertex_bytes() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 * 8 * 4);
    for position in CUBE_POSITIONS.iter() {
        bytes.extend(position.iter().map(|v| *v as u8));
    }
    for color in CUBE_COLORS.iter() {
        bytes.extend_from_slice(color);
    }
    bytes
}

fn cube_index_bytes() -> Vec<u8> {
    CUBE_INDICES.iter().flat_map(|i| i.to_ne_bytes().to_vec()).collect()
}

/// Views a float slice as raw bytes for buffer uploads.
pub fn float_bytes(data: &[f32]) -> &[u8] {
    unsafe { slice::from_raw_parts(data.as_ptr() as *const u8, data.len() * mem::size_of::<f32>()) }
}

/// Linear congruential generator with the float trick of the reference
/// layout: 23 random mantissa bits under a fixed exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VRRandom {
    state: u32,
}

impl VRRandom {
    pub fn new(seed: u32) -> VRRandom {
        VRRandom { state: seed }
    }

    /// Uniform float in [0, 1).
    pub fn next_float(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        f32::from_bits(0x3F80_0000 | (self.state & 0x007F_FFFF)) - 1.0
    }
}

/// The procedurally generated instance table. Depends only on the settings,
/// so the same seed always yields the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct VRSceneLayout {
    pub rotations: Vec<[f32; 3]>,
    // Sorted by squared distance from the origin, nearest first.
    pub positions: Vec<[f32; 3]>,
    pub rotation_indices: Vec<usize>,
}

impl VRSceneLayout {
    pub fn generate(num_instances: usize,
                    num_rotations: usize,
                    seed: u32,
                    attempt_limit: u32) -> Result<VRSceneLayout, VRError> {
        if num_rotations == 0 {
            return Err(VRError::InvalidSettings("at least one instance rotation is needed".into()));
        }
        let mut random = VRRandom::new(seed);

        let rotations: Vec<[f32; 3]> = (0..num_rotations).map(|_| {
            [random.next_float(), random.next_float(), random.next_float()]
        }).collect();

        let spread = 50.0 + (num_instances as f64).sqrt();
        let mut positions = vec![[0.0f32; 3]; num_instances];
        let mut rotation_indices = vec![0usize; num_instances];

        for i in 0..num_instances {
            let mut attempts = 0;
            let candidate = loop {
                if attempts >= attempt_limit {
                    return Err(VRError::PlacementExhausted { placed: i, attempts: attempts });
                }
                attempts += 1;

                let mut p = [0.0f32; 3];
                for v in p.iter_mut() {
                    *v = ((random.next_float() as f64 - 0.5) * spread) as f32;
                }
                if p.iter().all(|v| v.abs() < MIN_SEPARATION) {
                    continue;
                }
                let overlap = positions[..i].iter().any(|other| {
                    (0..3).all(|axis| (p[axis] - other[axis]).abs() < MIN_SEPARATION)
                });
                if !overlap {
                    break p;
                }
            };

            let dist_sqr = length_sqr(&candidate);
            let mut insert = 0;
            for j in (1..i + 1).rev() {
                if dist_sqr > length_sqr(&positions[j - 1]) {
                    insert = j;
                    break;
                }
                positions[j] = positions[j - 1];
                rotation_indices[j] = rotation_indices[j - 1];
            }
            positions[insert] = candidate;
            rotation_indices[insert] = (random.next_float() * (num_rotations as f32 - 0.1)) as usize;
        }

        Ok(VRSceneLayout {
            rotations: rotations,
            positions: positions,
            rotation_indices: rotation_indices,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[inline]
fn length_sqr(p: &[f32; 3]) -> f32 {
    p[0] * p[0] + p[1] * p[1] + p[2] * p[2]
}

/// GPU program, cube geometry and the per-frame buffers of the cube world.
///
/// Everything here lives in the share group and may be used from any context
/// sharing it; vertex arrays are not, see `VRSceneVertexState`.
pub struct VRScene {
    id: u32,
    multiview: bool,
    program: VRProgram,
    vertex_buffer: u32,
    index_buffer: u32,
    instance_buffer: u32,
    scene_matrices: u32,
    layout: VRSceneLayout,
}

impl VRScene {
    pub fn create(gpu: &dyn VRGpu, settings: &VRPipelineSettings, use_multiview: bool) -> Result<VRScene, VRError> {
        // Placement first: it can fail without anything to release.
        let layout = VRSceneLayout::generate(settings.num_instances,
                                             settings.num_rotations,
                                             settings.random_seed,
                                             settings.placement_attempt_limit)?;

        let mut scene = VRScene {
            id: utils::new_id(),
            multiview: use_multiview,
            program: VRProgram::default(),
            vertex_buffer: 0,
            index_buffer: 0,
            instance_buffer: 0,
            scene_matrices: 0,
            layout: layout,
        };

        if let Err(e) = scene.create_gpu_objects(gpu) {
            scene.destroy(gpu);
            return Err(e);
        }

        debug!("Created scene {} with {} instances (multiview: {})", scene.id, scene.layout.len(), use_multiview);
        Ok(scene)
    }

    fn create_gpu_objects(&mut self, gpu: &dyn VRGpu) -> Result<(), VRError> {
        let (vertex_source, fragment_source) = program_sources(self.multiview);
        self.program = gpu.create_program(&VRProgramDesc {
            vertex_source: &vertex_source,
            fragment_source: &fragment_source,
            attributes: &PROGRAM_ATTRIBUTES,
            uniform_blocks: &PROGRAM_UNIFORM_BLOCKS,
            view_id_uniform: "ViewID",
        }).map_err(VRError::Gpu)?;

        let vertices = cube_vertex_bytes();
        self.vertex_buffer = gpu.create_buffer(VRBufferTarget::Vertex, vertices.len(), Some(&vertices))
                                .map_err(VRError::Gpu)?;
        let indices = cube_index_bytes();
        self.index_buffer = gpu.create_buffer(VRBufferTarget::Index, indices.len(), Some(&indices))
                               .map_err(VRError::Gpu)?;

        self.instance_buffer = gpu.create_buffer(VRBufferTarget::Vertex,
                                                 self.layout.len() * INSTANCE_TRANSFORM_SIZE,
                                                 None).map_err(VRError::Gpu)?;
        self.scene_matrices = gpu.create_buffer(VRBufferTarget::Uniform, SCENE_MATRICES_SIZE, None)
                                 .map_err(VRError::Gpu)?;
        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn multiview(&self) -> bool {
        self.multiview
    }

    pub fn program(&self) -> &VRProgram {
        &self.program
    }

    pub fn layout(&self) -> &VRSceneLayout {
        &self.layout
    }

    pub fn instance_buffer(&self) -> u32 {
        self.instance_buffer
    }

    pub fn scene_matrices(&self) -> u32 {
        self.scene_matrices
    }

    pub fn index_count(&self) -> i32 {
        CUBE_INDICES.len() as i32
    }

    /// Geometry attributes plus the four instanced columns of the transform.
    pub fn vertex_layout(&self) -> VRVertexLayout {
        let mut attributes = vec![
            VRVertexAttribute {
                location: VERTEX_ATTRIBUTE_LOCATION_POSITION,
                buffer: self.vertex_buffer,
                components: 4,
                attribute_type: VRAttributeType::Byte,
                normalized: true,
                stride: 4,
                offset: 0,
                divisor: 0,
            },
            VRVertexAttribute {
                location: VERTEX_ATTRIBUTE_LOCATION_COLOR,
                buffer: self.vertex_buffer,
                components: 4,
                attribute_type: VRAttributeType::UnsignedByte,
                normalized: true,
                stride: 4,
                offset: CUBE_COLOR_OFFSET,
                divisor: 0,
            },
        ];
        for i in 0..4 {
            attributes.push(VRVertexAttribute {
                location: VERTEX_ATTRIBUTE_LOCATION_TRANSFORM + i,
                buffer: self.instance_buffer,
                components: 4,
                attribute_type: VRAttributeType::Float,
                normalized: false,
                stride: INSTANCE_TRANSFORM_SIZE as i32,
                offset: i * 4 * 4,
                divisor: 1,
            });
        }
        VRVertexLayout {
            attributes: attributes,
            index_buffer: self.index_buffer,
        }
    }

    /// Must run after every context's `VRSceneVertexState` let go of it.
    pub fn destroy(&mut self, gpu: &dyn VRGpu) {
        if self.program.program != 0 {
            gpu.delete_program(&self.program);
            self.program = VRProgram::default();
        }
        for buffer in [&mut self.vertex_buffer, &mut self.index_buffer,
                       &mut self.instance_buffer, &mut self.scene_matrices].iter_mut() {
            if **buffer != 0 {
                gpu.delete_buffer(**buffer);
                **buffer = 0;
            }
        }
    }
}

/// Vertex array object of a scene on one particular context.
///
/// Vertex arrays are not shared between contexts, so the render thread keeps
/// its own and rebuilds it when handed a different scene.
#[derive(Debug, Default)]
pub struct VRSceneVertexState {
    scene_id: Option<u32>,
    vertex_array: u32,
}

impl VRSceneVertexState {
    pub fn new() -> VRSceneVertexState {
        VRSceneVertexState::default()
    }

    pub fn vertex_array(&self) -> u32 {
        self.vertex_array
    }

    pub fn scene_id(&self) -> Option<u32> {
        self.scene_id
    }

    pub fn ensure(&mut self, gpu: &dyn VRGpu, scene: &VRScene) -> Result<(), VRError> {
        if self.scene_id == Some(scene.id()) {
            return Ok(());
        }
        self.destroy(gpu);
        self.vertex_array = gpu.create_vertex_array(&scene.vertex_layout()).map_err(VRError::Gpu)?;
        self.scene_id = Some(scene.id());
        debug!("Created vertex array {} for scene {}", self.vertex_array, scene.id());
        Ok(())
    }

    pub fn destroy(&mut self, gpu: &dyn VRGpu) {
        if self.vertex_array != 0 {
            gpu.delete_vertex_array(self.vertex_array);
            self.vertex_array = 0;
        }
        self.scene_id = None;
    }
}


#[cfg(all(test, feature = "mock"))]
mod mock_tests {
    use super::*;
    use crate::api::mock::MockGpu;
    use rust_vrframe_api::VRGpuCapabilities;

    fn settings() -> VRPipelineSettings {
        VRPipelineSettings {
            num_instances: 64,
            ..VRPipelineSettings::default()
        }
    }

    #[test]
    fn vertex_state_is_built_once_per_scene() {
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let mut scene = VRScene::create(&gpu, &settings(), false).unwrap();
        let mut other = VRScene::create(&gpu, &settings(), false).unwrap();
        let mut state = VRSceneVertexState::new();

        state.ensure(&gpu, &scene).unwrap();
        let first = state.vertex_array();
        state.ensure(&gpu, &scene).unwrap();
        assert_eq!(state.vertex_array(), first);
        assert_eq!(gpu.state_handle().lock().unwrap().live_vertex_arrays(), 1);

        state.ensure(&gpu, &other).unwrap();
        assert!(state.vertex_array() != first);
        assert_eq!(state.scene_id(), Some(other.id()));
        assert_eq!(gpu.state_handle().lock().unwrap().live_vertex_arrays(), 1);

        state.destroy(&gpu);
        scene.destroy(&gpu);
        other.destroy(&gpu);
        let gpu_state = gpu.state_handle();
        let gpu_state = gpu_state.lock().unwrap();
        assert_eq!(gpu_state.live_vertex_arrays(), 0);
        assert_eq!(gpu_state.live_buffers(), 0);
        assert_eq!(gpu_state.live_programs(), 0);
    }

    #[test]
    fn instanced_transform_columns_use_divisor_one() {
        let gpu = MockGpu::new(VRGpuCapabilities::default());
        let scene = VRScene::create(&gpu, &settings(), true).unwrap();
        let layout = scene.vertex_layout();
        let instanced: Vec<_> = layout.attributes.iter().filter(|a| a.divisor == 1).collect();
        assert_eq!(instanced.len(), 4);
        assert!(instanced.iter().all(|a| a.buffer == scene.instance_buffer() && a.stride == 64));
        assert_eq!(instanced[3].location, VERTEX_ATTRIBUTE_LOCATION_TRANSFORM + 3);
        assert_eq!(instanced[3].offset, 48);
        assert_eq!(gpu.state_handle().lock().unwrap().buffer_size(scene.instance_buffer()), Some(64 * 64));
    }
}
