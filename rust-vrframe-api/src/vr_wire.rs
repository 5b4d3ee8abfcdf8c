//! Bit-exact C layouts of the flexible submission protocol.
//!
//! These mirror the compositor ABI on 64-bit targets. `VRWireFrame` owns every
//! encoded layer so the pointer array handed to the compositor stays valid for
//! as long as the frame is alive.

use std::os::raw::c_void;
use std::ptr;
use crate::{VRLayer, VRLayerHeader, VRPose, VRSubmitDescription};
use crate::vr_layer::VRSwapChainImage;
use crate::vr_tracking::EYE_COUNT;

pub type VRWireMatrix = [[f32; 4]; 4];

fn wire_matrix(m: &[f32; 16]) -> VRWireMatrix {
    [[m[0], m[1], m[2], m[3]],
     [m[4], m[5], m[6], m[7]],
     [m[8], m[9], m[10], m[11]],
     [m[12], m[13], m[14], m[15]]]
}

// Swapchains travel as opaque pointer-sized values.
fn wire_swapchain(image: &VRSwapChainImage) -> (usize, i32) {
    (image.swapchain.0 as usize, image.index as i32)
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireLayerHeader {
    pub layer_type: u32,
    pub flags: u32,
    pub color_scale: [f32; 4],
    pub src_blend: u32,
    pub dst_blend: u32,
    pub reserved: *mut c_void,
}

impl VRWireLayerHeader {
    fn new(layer_type: u32, header: &VRLayerHeader) -> VRWireLayerHeader {
        VRWireLayerHeader {
            layer_type: layer_type,
            flags: header.flags.bits(),
            color_scale: header.color_scale,
            src_blend: header.src_blend as u32,
            dst_blend: header.dst_blend as u32,
            reserved: ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireRigidBodyPose {
    pub orientation: [f32; 4],
    pub position: [f32; 3],
    pub angular_velocity: [f32; 3],
    pub linear_velocity: [f32; 3],
    pub angular_acceleration: [f32; 3],
    pub linear_acceleration: [f32; 3],
    pub padding: u32,
    pub time_in_seconds: f64,
    pub prediction_in_seconds: f64,
}

impl<'a> From<&'a VRPose> for VRWireRigidBodyPose {
    fn from(pose: &'a VRPose) -> VRWireRigidBodyPose {
        VRWireRigidBodyPose {
            orientation: pose.orientation,
            position: pose.position,
            angular_velocity: pose.angular_velocity,
            linear_velocity: pose.linear_velocity,
            angular_acceleration: pose.angular_acceleration,
            linear_acceleration: pose.linear_acceleration,
            padding: 0,
            time_in_seconds: pose.time_in_seconds,
            prediction_in_seconds: pose.prediction_in_seconds,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireProjectionTexture {
    pub color_swapchain: usize,
    pub swapchain_index: i32,
    pub tex_coords_from_tan_angles: VRWireMatrix,
    pub texture_rect: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireProjectionLayer {
    pub header: VRWireLayerHeader,
    pub head_pose: VRWireRigidBodyPose,
    pub textures: [VRWireProjectionTexture; EYE_COUNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireCylinderTexture {
    pub color_swapchain: usize,
    pub swapchain_index: i32,
    pub tex_coords_from_tan_angles: VRWireMatrix,
    pub texture_rect: [f32; 4],
    pub texture_matrix: VRWireMatrix,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireCylinderLayer {
    pub header: VRWireLayerHeader,
    pub head_pose: VRWireRigidBodyPose,
    pub textures: [VRWireCylinderTexture; EYE_COUNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireCubeTexture {
    pub color_swapchain: usize,
    pub swapchain_index: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireCubeLayer {
    pub header: VRWireLayerHeader,
    pub head_pose: VRWireRigidBodyPose,
    pub tex_coords_from_tan_angles: VRWireMatrix,
    pub offset: [f32; 3],
    pub textures: [VRWireCubeTexture; EYE_COUNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireEquirectTexture {
    pub color_swapchain: usize,
    pub swapchain_index: i32,
    pub texture_rect: [f32; 4],
    pub texture_matrix: VRWireMatrix,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireEquirectLayer {
    pub header: VRWireLayerHeader,
    pub head_pose: VRWireRigidBodyPose,
    pub tex_coords_from_tan_angles: VRWireMatrix,
    pub textures: [VRWireEquirectTexture; EYE_COUNT],
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireLoadingIconLayer {
    pub header: VRWireLayerHeader,
    pub spin_speed: f32,
    pub spin_scale: f32,
    pub color_swapchain: usize,
    pub swapchain_index: i32,
}

/// Every layer starts with a `VRWireLayerHeader`, so the header is readable
/// whatever variant was written.
#[repr(C)]
#[derive(Clone, Copy)]
pub union VRWireLayer {
    pub header: VRWireLayerHeader,
    pub projection: VRWireProjectionLayer,
    pub cylinder: VRWireCylinderLayer,
    pub cube: VRWireCubeLayer,
    pub equirect: VRWireEquirectLayer,
    pub loading_icon: VRWireLoadingIconLayer,
}

impl VRWireLayer {
    pub fn encode(layer: &VRLayer) -> VRWireLayer {
        let header = VRWireLayerHeader::new(layer.layer_type() as u32, layer.header());
        match *layer {
            VRLayer::Projection(ref layer) => {
                let mut textures = [VRWireProjectionTexture {
                    color_swapchain: 0,
                    swapchain_index: 0,
                    tex_coords_from_tan_angles: wire_matrix(&identity_matrix!()),
                    texture_rect: [0.0, 0.0, 1.0, 1.0],
                }; EYE_COUNT];
                for (wire, texture) in textures.iter_mut().zip(layer.textures.iter()) {
                    let (color_swapchain, swapchain_index) = wire_swapchain(&texture.image);
                    *wire = VRWireProjectionTexture {
                        color_swapchain: color_swapchain,
                        swapchain_index: swapchain_index,
                        tex_coords_from_tan_angles: wire_matrix(&texture.tex_coords_from_tan_angles),
                        texture_rect: texture.texture_rect,
                    };
                }
                VRWireLayer {
                    projection: VRWireProjectionLayer {
                        header: header,
                        head_pose: (&layer.head_pose).into(),
                        textures: textures,
                    },
                }
            }
            VRLayer::Cylinder(ref layer) => {
                let encode = |i: usize| {
                    let texture = &layer.textures[i];
                    let (color_swapchain, swapchain_index) = wire_swapchain(&texture.image);
                    VRWireCylinderTexture {
                        color_swapchain: color_swapchain,
                        swapchain_index: swapchain_index,
                        tex_coords_from_tan_angles: wire_matrix(&texture.tex_coords_from_tan_angles),
                        texture_rect: texture.texture_rect,
                        texture_matrix: wire_matrix(&texture.texture_matrix),
                    }
                };
                VRWireLayer {
                    cylinder: VRWireCylinderLayer {
                        header: header,
                        head_pose: (&layer.head_pose).into(),
                        textures: [encode(0), encode(1)],
                    },
                }
            }
            VRLayer::Cube(ref layer) => {
                let encode = |i: usize| {
                    let (color_swapchain, swapchain_index) = wire_swapchain(&layer.textures[i]);
                    VRWireCubeTexture { color_swapchain: color_swapchain, swapchain_index: swapchain_index }
                };
                VRWireLayer {
                    cube: VRWireCubeLayer {
                        header: header,
                        head_pose: (&layer.head_pose).into(),
                        tex_coords_from_tan_angles: wire_matrix(&layer.tex_coords_from_tan_angles),
                        offset: layer.offset,
                        textures: [encode(0), encode(1)],
                    },
                }
            }
            VRLayer::Equirect(ref layer) => {
                let encode = |i: usize| {
                    let texture = &layer.textures[i];
                    let (color_swapchain, swapchain_index) = wire_swapchain(&texture.image);
                    VRWireEquirectTexture {
                        color_swapchain: color_swapchain,
                        swapchain_index: swapchain_index,
                        texture_rect: texture.texture_rect,
                        texture_matrix: wire_matrix(&texture.texture_matrix),
                    }
                };
                VRWireLayer {
                    equirect: VRWireEquirectLayer {
                        header: header,
                        head_pose: (&layer.head_pose).into(),
                        tex_coords_from_tan_angles: wire_matrix(&layer.tex_coords_from_tan_angles),
                        textures: [encode(0), encode(1)],
                    },
                }
            }
            VRLayer::LoadingIcon(ref layer) => {
                let (color_swapchain, swapchain_index) = wire_swapchain(&layer.image);
                VRWireLayer {
                    loading_icon: VRWireLoadingIconLayer {
                        header: header,
                        spin_speed: layer.spin_speed,
                        spin_scale: layer.spin_scale,
                        color_swapchain: color_swapchain,
                        swapchain_index: swapchain_index,
                    },
                }
            }
        }
    }

    pub fn header(&self) -> &VRWireLayerHeader {
        // Every variant is repr(C) and starts with the header.
        unsafe { &self.header }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VRWireSubmitDescription {
    pub flags: u32,
    pub swap_interval: u32,
    pub frame_index: u64,
    pub display_time: f64,
    pub completion_fence: u64,
    pub layer_count: u32,
    pub layers: *const *const VRWireLayerHeader,
}

/// An encoded submission together with the memory it points into.
pub struct VRWireFrame {
    layers: Vec<Box<VRWireLayer>>,
    layer_ptrs: Vec<*const VRWireLayerHeader>,
    desc: VRWireSubmitDescription,
}

impl VRWireFrame {
    pub fn encode(desc: &VRSubmitDescription) -> VRWireFrame {
        let layers: Vec<Box<VRWireLayer>> = desc.layers
            .iter()
            .map(|layer| Box::new(VRWireLayer::encode(layer)))
            .collect();
        // Boxed layers never move, so these stay valid while `layers` lives.
        let layer_ptrs: Vec<*const VRWireLayerHeader> = layers
            .iter()
            .map(|layer| layer.header() as *const VRWireLayerHeader)
            .collect();

        let wire = VRWireSubmitDescription {
            flags: desc.flags.bits(),
            swap_interval: desc.swap_interval,
            frame_index: desc.frame_index,
            display_time: desc.display_time,
            completion_fence: desc.completion_fence,
            layer_count: layer_ptrs.len() as u32,
            layers: layer_ptrs.as_ptr(),
        };

        VRWireFrame {
            layers: layers,
            layer_ptrs: layer_ptrs,
            desc: wire,
        }
    }

    /// The descriptor to hand to the compositor. Only valid while `self` is alive.
    pub fn description(&self) -> &VRWireSubmitDescription {
        &self.desc
    }

    pub fn layer(&self, index: usize) -> Option<&VRWireLayer> {
        self.layers.get(index).map(|layer| &**layer)
    }

    pub fn layer_count(&self) -> usize {
        self.layer_ptrs.len()
    }
}
