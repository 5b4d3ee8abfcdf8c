//! The legacy monolithic frame description.
//!
//! Older compositor clients describe a frame as a fixed array of up to four
//! layers with per-frame performance parameters embedded. These types keep
//! that shape and convert it into the flexible `VRSubmitDescription`.

use crate::{VRError, VRFrameFlags, VRLayer, VRLayerBlend, VRLayerFlags, VRLayerHeader,
            VRLayerTexture, VRLoadingIconLayer, VRPose, VRProjectionLayer, VRSubmitDescription};
use crate::vr_layer::{VRSwapChainId, VRSwapChainImage};
use crate::vr_tracking::EYE_COUNT;

/// Fixed layer capacity of a legacy frame.
pub const MAX_FRAME_LAYERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub enum VRExtraLatencyMode {
    Off = 0,
    On = 1,
    Dynamic = 2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRFrameLayerTexture {
    pub color_swapchain: VRSwapChainId,
    pub swapchain_index: u32,
    pub tex_coords_from_tan_angles: [f32; 16],
    pub texture_rect: [f32; 4],
    // Pose the eye image was rendered with.
    pub head_pose: VRPose,
    pub completion_fence: u64,
}

impl Default for VRFrameLayerTexture {
    fn default() -> VRFrameLayerTexture {
        VRFrameLayerTexture {
            color_swapchain: VRSwapChainId::NONE,
            swapchain_index: 0,
            tex_coords_from_tan_angles: identity_matrix!(),
            texture_rect: [0.0, 0.0, 1.0, 1.0],
            head_pose: VRPose::default(),
            completion_fence: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRFrameLayer {
    pub textures: [VRFrameLayerTexture; EYE_COUNT],
    // Only used when `flags` contains SPIN.
    pub spin_speed: f32,
    pub spin_scale: f32,
    // Scalar color scale, applied to all four channels.
    pub color_scale: f32,
    pub src_blend: VRLayerBlend,
    pub dst_blend: VRLayerBlend,
    pub flags: VRLayerFlags,
}

impl Default for VRFrameLayer {
    fn default() -> VRFrameLayer {
        VRFrameLayer {
            textures: [VRFrameLayerTexture::default(); EYE_COUNT],
            spin_speed: 0.0,
            spin_scale: 0.0,
            color_scale: 1.0,
            src_blend: VRLayerBlend::One,
            dst_blend: VRLayerBlend::Zero,
            flags: VRLayerFlags::empty(),
        }
    }
}

impl VRFrameLayer {
    fn header(&self) -> VRLayerHeader {
        VRLayerHeader {
            flags: self.flags,
            color_scale: [self.color_scale; 4],
            src_blend: self.src_blend,
            dst_blend: self.dst_blend,
        }
    }

    fn black() -> VRFrameLayer {
        let mut layer = VRFrameLayer::default();
        for texture in layer.textures.iter_mut() {
            texture.color_swapchain = VRSwapChainId::DEFAULT;
        }
        layer.flags = VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER;
        layer
    }

    fn loading_icon() -> VRFrameLayer {
        let defaults = VRLoadingIconLayer::default();
        let mut layer = VRFrameLayer::default();
        for texture in layer.textures.iter_mut() {
            texture.color_swapchain = VRSwapChainId::DEFAULT_LOADING_ICON;
        }
        layer.spin_speed = defaults.spin_speed;
        layer.spin_scale = defaults.spin_scale;
        layer.src_blend = defaults.header.src_blend;
        layer.dst_blend = defaults.header.dst_blend;
        layer.flags = VRLayerFlags::SPIN | VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER;
        layer
    }

    /// Converts this layer into its flexible counterpart.
    /// Spinning layers become loading icons, everything else a projection.
    pub fn to_layer(&self) -> VRLayer {
        if self.flags.contains(VRLayerFlags::SPIN) {
            let texture = &self.textures[0];
            return VRLayer::LoadingIcon(VRLoadingIconLayer {
                header: self.header(),
                spin_speed: self.spin_speed,
                spin_scale: self.spin_scale,
                image: VRSwapChainImage::new(texture.color_swapchain, texture.swapchain_index),
            });
        }

        let mut layer = VRProjectionLayer {
            header: self.header(),
            head_pose: self.textures[0].head_pose,
            ..VRProjectionLayer::default()
        };
        for (target, source) in layer.textures.iter_mut().zip(self.textures.iter()) {
            *target = VRLayerTexture {
                image: VRSwapChainImage::new(source.color_swapchain, source.swapchain_index),
                tex_coords_from_tan_angles: source.tex_coords_from_tan_angles,
                texture_rect: source.texture_rect,
            };
        }
        VRLayer::Projection(layer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRPerformanceParms {
    // Fixed clock levels in the range [0, 3].
    pub cpu_level: i32,
    pub gpu_level: i32,
    // Threads that get real-time scheduling, 0 if unknown.
    pub main_thread_tid: u32,
    pub render_thread_tid: u32,
}

impl Default for VRPerformanceParms {
    fn default() -> VRPerformanceParms {
        VRPerformanceParms {
            cpu_level: 2,
            gpu_level: 2,
            main_thread_tid: 0,
            render_thread_tid: 0,
        }
    }
}

/// Presets for commonly submitted legacy frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VRFrameInit {
    Default,
    Black,
    BlackFlush,
    BlackFinal,
    LoadingIcon,
    LoadingIconFlush,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialization", derive(Deserialize, Serialize))]
pub struct VRFrameParms {
    pub layers: [VRFrameLayer; MAX_FRAME_LAYERS],
    pub layer_count: usize,
    pub flags: VRFrameFlags,
    pub frame_index: u64,
    pub swap_interval: u32,
    pub extra_latency_mode: VRExtraLatencyMode,
    pub performance_parms: VRPerformanceParms,
}

impl Default for VRFrameParms {
    fn default() -> VRFrameParms {
        VRFrameParms::new(VRFrameInit::Default)
    }
}

impl VRFrameParms {
    pub fn new(init: VRFrameInit) -> VRFrameParms {
        let mut parms = VRFrameParms {
            layers: [VRFrameLayer::default(); MAX_FRAME_LAYERS],
            layer_count: 1,
            flags: VRFrameFlags::empty(),
            frame_index: 0,
            swap_interval: 1,
            extra_latency_mode: VRExtraLatencyMode::Off,
            performance_parms: VRPerformanceParms::default(),
        };

        match init {
            VRFrameInit::Default => {}
            VRFrameInit::Black | VRFrameInit::BlackFlush | VRFrameInit::BlackFinal => {
                parms.layers[0] = VRFrameLayer::black();
            }
            VRFrameInit::LoadingIcon | VRFrameInit::LoadingIconFlush => {
                parms.layers[0] = VRFrameLayer::black();
                parms.layers[1] = VRFrameLayer::loading_icon();
                parms.layer_count = 2;
            }
        }

        match init {
            VRFrameInit::BlackFlush | VRFrameInit::LoadingIconFlush => {
                parms.flags |= VRFrameFlags::FLUSH;
            }
            VRFrameInit::BlackFinal => {
                parms.flags |= VRFrameFlags::FLUSH | VRFrameFlags::FINAL;
            }
            _ => {}
        }

        parms
    }

    pub fn active_layers(&self) -> &[VRFrameLayer] {
        &self.layers[..self.layer_count.min(MAX_FRAME_LAYERS)]
    }

    /// Maps this legacy frame onto the flexible submission descriptor.
    /// The legacy shape has no display time, it has to be supplied from the
    /// prediction that was made for `frame_index`.
    pub fn to_submission(&self, display_time: f64) -> Result<VRSubmitDescription, VRError> {
        if self.layer_count == 0 || self.layer_count > MAX_FRAME_LAYERS {
            return Err(VRError::ProtocolViolation(format!(
                "legacy frame with {} layers, expected 1..={}",
                self.layer_count, MAX_FRAME_LAYERS
            )));
        }

        let completion_fence = self
            .active_layers()
            .iter()
            .flat_map(|layer| layer.textures.iter())
            .map(|texture| texture.completion_fence)
            .find(|fence| *fence != 0)
            .unwrap_or(0);

        Ok(VRSubmitDescription {
            flags: self.flags,
            swap_interval: self.swap_interval,
            frame_index: self.frame_index,
            display_time: display_time,
            completion_fence: completion_fence,
            layers: self.active_layers().iter().map(VRFrameLayer::to_layer).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VRLayerType;

    #[test]
    fn loading_icon_preset_converts_to_black_plus_spinner() {
        let mut parms = VRFrameParms::new(VRFrameInit::LoadingIconFlush);
        parms.frame_index = 7;
        let desc = parms.to_submission(1.5).unwrap();

        assert_eq!(desc.frame_index, 7);
        assert_eq!(desc.display_time, 1.5);
        assert!(desc.flags.contains(VRFrameFlags::FLUSH));
        let types: Vec<_> = desc.layers.iter().map(|l| l.layer_type()).collect();
        assert_eq!(types, vec![VRLayerType::Projection, VRLayerType::LoadingIcon]);

        match desc.layers[1] {
            VRLayer::LoadingIcon(ref icon) => {
                assert_eq!(icon.spin_scale, 16.0);
                assert_eq!(icon.image.swapchain, VRSwapChainId::DEFAULT_LOADING_ICON);
            }
            ref other => panic!("unexpected layer {:?}", other),
        }
    }

    #[test]
    fn black_final_preset_is_final() {
        let desc = VRFrameParms::new(VRFrameInit::BlackFinal).to_submission(0.0).unwrap();
        assert!(desc.is_final());
        assert!(desc.flags.contains(VRFrameFlags::FLUSH));
        assert_eq!(desc.layers.len(), 1);
        assert!(desc.layers[0].flags().contains(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER));
    }

    #[test]
    fn projection_layer_keeps_eye_images_and_fence() {
        let mut parms = VRFrameParms::default();
        parms.layers[0].textures[0].color_swapchain = VRSwapChainId(40);
        parms.layers[0].textures[0].swapchain_index = 2;
        parms.layers[0].textures[1].color_swapchain = VRSwapChainId(41);
        parms.layers[0].textures[1].completion_fence = 99;
        parms.layers[0].color_scale = 0.5;

        let desc = parms.to_submission(0.0).unwrap();
        assert_eq!(desc.completion_fence, 99);
        match desc.layers[0] {
            VRLayer::Projection(ref layer) => {
                assert_eq!(layer.textures[0].image, VRSwapChainImage::new(VRSwapChainId(40), 2));
                assert_eq!(layer.textures[1].image.swapchain, VRSwapChainId(41));
                assert_eq!(layer.header.color_scale, [0.5; 4]);
            }
            ref other => panic!("unexpected layer {:?}", other),
        }
    }

    #[test]
    fn too_many_legacy_layers_is_rejected() {
        let mut parms = VRFrameParms::default();
        parms.layer_count = MAX_FRAME_LAYERS + 1;
        assert!(parms.to_submission(0.0).is_err());
    }
}
