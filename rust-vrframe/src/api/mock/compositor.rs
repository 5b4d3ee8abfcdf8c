use euclid::{RigidTransform3D, Rotation3D, UnknownUnit, Vector3D};
use rust_vrframe_api::utils;
use rust_vrframe_api::{MockVRControlMsg, VRCompositor, VREyeMatrices, VRInputState, VRLayer, VRModeParms, VRPerfThreadType,
                       VRPose, VRSessionHandle, VRSubmitDescription, VRSwapChainId, VRSystemProperties, VRSystemUI,
                       VRTextureSwapChainDesc, VRTracking, VRTrackingStatus};
use std::cmp;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

// Distance between the eyes, in meters.
const IPD: f32 = 0.064;
const HEAD_HEIGHT: f32 = 1.6;
// Delay between the pose sample and the predicted display time.
const PREDICTION: f64 = 0.048;

#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub session: VRSessionHandle,
    pub desc: VRSubmitDescription,
    // Thread the frame was submitted from, see `utils::current_thread_id`.
    pub thread_id: u32,
}

/// Everything the mock compositor was asked to do, for tests to inspect.
pub struct MockCompositorState {
    pub initialized: bool,
    pub shut_down: bool,
    pub properties: VRSystemProperties,
    // Replaces the generated head pose and eye matrices when set.
    pub tracking: Option<VRTracking>,
    pub input_devices: Vec<VRInputState>,
    pub reject_vr_mode: bool,
    pub submit_delay_ms: u64,

    pub mode_parms: Vec<VRModeParms>,
    pub active_sessions: Vec<VRSessionHandle>,
    pub left_sessions: Vec<VRSessionHandle>,
    pub clock_levels: Vec<(i32, i32)>,
    pub perf_threads: Vec<(VRPerfThreadType, u32)>,
    pub shown_ui: Vec<VRSystemUI>,

    pub swapchains: Vec<(VRSwapChainId, VRTextureSwapChainDesc)>,
    pub destroyed_swapchains: Vec<VRSwapChainId>,

    pub predicted_frames: Vec<u64>,
    pub submissions: Vec<MockSubmission>,
    // Submissions the compositor refused, with the reason.
    pub rejected_submissions: Vec<String>,
    pub max_concurrent_submits: usize,

    submits_in_flight: usize,
    finalized_sessions: Vec<VRSessionHandle>,
    next_handle: u64,
    start_time: f64,
}

impl MockCompositorState {
    pub fn new() -> MockCompositorState {
        MockCompositorState {
            initialized: false,
            shut_down: false,
            properties: VRSystemProperties {
                suggested_eye_texture_width: 1536,
                suggested_eye_texture_height: 1536,
                suggested_eye_fov_degrees_x: 90.0,
                suggested_eye_fov_degrees_y: 90.0,
                multiview_available: true,
                display_refresh_rate: 72.0,
            },
            tracking: None,
            input_devices: Vec::new(),
            reject_vr_mode: false,
            submit_delay_ms: 0,
            mode_parms: Vec::new(),
            active_sessions: Vec::new(),
            left_sessions: Vec::new(),
            clock_levels: Vec::new(),
            perf_threads: Vec::new(),
            shown_ui: Vec::new(),
            swapchains: Vec::new(),
            destroyed_swapchains: Vec::new(),
            predicted_frames: Vec::new(),
            submissions: Vec::new(),
            rejected_submissions: Vec::new(),
            max_concurrent_submits: 0,
            submits_in_flight: 0,
            finalized_sessions: Vec::new(),
            // Clear of the built-in swapchain ids.
            next_handle: 0x100,
            start_time: utils::time_in_seconds(),
        }
    }

    pub fn handle_msg(&mut self, msg: MockVRControlMsg) {
        match msg {
            MockVRControlMsg::SetTracking(tracking) => self.tracking = Some(tracking),
            MockVRControlMsg::SetSystemProperties(properties) => self.properties = properties,
            MockVRControlMsg::SetInputDevices(devices) => self.input_devices = devices,
            MockVRControlMsg::RejectVRMode(reject) => self.reject_vr_mode = reject,
            MockVRControlMsg::SetSubmitDelay(delay) => self.submit_delay_ms = delay,
        }
    }

    pub fn final_submissions(&self) -> usize {
        self.submissions.iter().filter(|s| s.desc.is_final()).count()
    }

    pub fn live_swapchains(&self) -> usize {
        self.swapchains.len() - self.destroyed_swapchains.len()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn swapchain(&self, id: VRSwapChainId) -> Option<&VRTextureSwapChainDesc> {
        if self.destroyed_swapchains.contains(&id) {
            return None;
        }
        self.swapchains.iter().find(|&&(chain, _)| chain == id).map(|&(_, ref desc)| desc)
    }

    fn check_submission(&self, session: VRSessionHandle, desc: &VRSubmitDescription) -> Result<(), String> {
        if !self.active_sessions.contains(&session) {
            return Err(format!("frame {} submitted to inactive session {:?}", desc.frame_index, session));
        }
        if self.finalized_sessions.contains(&session) {
            return Err(format!("frame {} submitted after the final frame", desc.frame_index));
        }
        for layer in &desc.layers {
            if let VRLayer::Projection(ref projection) = *layer {
                for texture in projection.textures.iter() {
                    let swapchain = texture.image.swapchain;
                    if !swapchain.is_builtin() && self.swapchain(swapchain).is_none() {
                        return Err(format!("unknown swapchain {:?}", swapchain));
                    }
                }
            }
        }
        Ok(())
    }

    fn tracking(&self, display_time: f64) -> VRTracking {
        let sample_time = display_time - PREDICTION;
        if let Some(mut tracking) = self.tracking {
            let pose = tracking.head_pose;
            tracking.head_pose = VRPose::predicted(pose.orientation, pose.position, sample_time, display_time);
            return tracking;
        }

        let head_pose = VRPose::predicted([0.0, 0.0, 0.0, 1.0], [0.0, HEAD_HEIGHT, 0.0], sample_time, display_time);
        let props = &self.properties;
        let projection = utils::projection_matrix_fov(props.suggested_eye_fov_degrees_x,
                                                      props.suggested_eye_fov_degrees_y,
                                                      0.0, 0.0, 0.1, 0.0);
        let head_view = head_view_matrix(&head_pose);
        let mut eyes = [VREyeMatrices::default(); 2];
        for (eye, matrices) in eyes.iter_mut().enumerate() {
            let mut view_matrix = head_view;
            // Left eye sits at -IPD/2 in head space, so the world moves the other way.
            view_matrix[3] += if eye == 0 { IPD * 0.5 } else { -IPD * 0.5 };
            *matrices = VREyeMatrices {
                projection_matrix: projection,
                view_matrix: view_matrix,
            };
        }

        VRTracking {
            status: VRTrackingStatus::ORIENTATION_TRACKED | VRTrackingStatus::POSITION_TRACKED |
                    VRTrackingStatus::HMD_CONNECTED,
            head_pose: head_pose,
            eyes: eyes,
        }
    }
}

// World to head transform, row-major.
fn head_view_matrix(pose: &VRPose) -> [f32; 16] {
    let o = pose.orientation;
    let p = pose.position;
    let rotation: Rotation3D<f32, UnknownUnit, UnknownUnit> = Rotation3D::quaternion(o[0], o[1], o[2], o[3]);
    let head_to_world = RigidTransform3D::new(rotation, Vector3D::new(p[0], p[1], p[2]));
    // euclid stores the translation in the last row; column-major flips it into ours.
    head_to_world.inverse().to_transform().to_column_major_array()
}

/// A compositor that records every call and can be steered through
/// `MockVRControlMsg`.
pub struct MockCompositor {
    state: Arc<Mutex<MockCompositorState>>,
}

impl MockCompositor {
    pub fn new() -> MockCompositor {
        MockCompositor {
            state: Arc::new(Mutex::new(MockCompositorState::new())),
        }
    }

    pub fn new_with_remote() -> (Arc<MockCompositor>, Sender<MockVRControlMsg>) {
        let (send, rcv) = channel();
        (Arc::new(MockCompositor::new_with_receiver(rcv)), send)
    }

    pub fn new_with_receiver(rcv: Receiver<MockVRControlMsg>) -> MockCompositor {
        let compositor = MockCompositor::new();
        let state = compositor.state.clone();
        thread::spawn(move || {
            while let Ok(msg) = rcv.recv() {
                state.lock().unwrap().handle_msg(msg);
            }
        });
        compositor
    }

    pub fn state_handle(&self) -> Arc<Mutex<MockCompositorState>> {
        self.state.clone()
    }

    fn lock(&self) -> MutexGuard<MockCompositorState> {
        self.state.lock().unwrap()
    }
}

impl VRCompositor for MockCompositor {
    fn initialize(&self) -> Result<(), String> {
        self.lock().initialized = true;
        Ok(())
    }

    fn shutdown(&self) {
        self.lock().shut_down = true;
    }

    fn system_properties(&self) -> VRSystemProperties {
        self.lock().properties
    }

    fn enter_vr_mode(&self, parms: &VRModeParms) -> Result<VRSessionHandle, String> {
        let mut state = self.lock();
        state.mode_parms.push(*parms);
        if state.reject_vr_mode {
            return Err(format!("invalid window surface {:#x}", parms.window_surface));
        }
        let session = VRSessionHandle(state.next_handle());
        state.active_sessions.push(session);
        Ok(session)
    }

    fn leave_vr_mode(&self, session: VRSessionHandle) {
        let mut state = self.lock();
        state.active_sessions.retain(|s| *s != session);
        state.left_sessions.push(session);
    }

    fn predicted_display_time(&self, _session: VRSessionHandle, frame_index: u64) -> f64 {
        let mut state = self.lock();
        state.predicted_frames.push(frame_index);
        state.start_time + frame_index as f64 / state.properties.display_refresh_rate as f64
    }

    fn predicted_tracking(&self, _session: VRSessionHandle, display_time: f64) -> VRTracking {
        self.lock().tracking(display_time)
    }

    fn submit_frame(&self, session: VRSessionHandle, desc: &VRSubmitDescription) -> Result<(), String> {
        let delay = {
            let mut state = self.lock();
            if let Err(msg) = state.check_submission(session, desc) {
                state.rejected_submissions.push(msg.clone());
                return Err(msg);
            }
            state.submits_in_flight += 1;
            state.max_concurrent_submits = cmp::max(state.max_concurrent_submits, state.submits_in_flight);
            state.submit_delay_ms
        };

        // Held outside the lock so overlapping submissions would show up.
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }

        let mut state = self.lock();
        state.submits_in_flight -= 1;
        if desc.is_final() {
            state.finalized_sessions.push(session);
        }
        state.submissions.push(MockSubmission {
            session: session,
            desc: desc.clone(),
            thread_id: utils::current_thread_id(),
        });
        Ok(())
    }

    fn set_clock_levels(&self, _session: VRSessionHandle, cpu_level: i32, gpu_level: i32) -> Result<(), String> {
        self.lock().clock_levels.push((cpu_level, gpu_level));
        Ok(())
    }

    fn set_perf_thread(&self, _session: VRSessionHandle, thread_type: VRPerfThreadType, tid: u32) -> Result<(), String> {
        self.lock().perf_threads.push((thread_type, tid));
        Ok(())
    }

    fn create_texture_swapchain(&self, desc: &VRTextureSwapChainDesc) -> Result<VRSwapChainId, String> {
        if desc.width == 0 || desc.height == 0 {
            return Err(format!("invalid swapchain size {}x{}", desc.width, desc.height));
        }
        let mut state = self.lock();
        let id = VRSwapChainId(state.next_handle());
        state.swapchains.push((id, *desc));
        Ok(id)
    }

    fn texture_swapchain_length(&self, swapchain: VRSwapChainId) -> u32 {
        self.lock().swapchain(swapchain).map_or(0, |desc| desc.buffer_count)
    }

    fn texture_swapchain_handle(&self, swapchain: VRSwapChainId, index: u32) -> u32 {
        // Unique and non-zero for every image of every chain.
        (swapchain.0 as u32) * 16 + index + 1
    }

    fn destroy_texture_swapchain(&self, swapchain: VRSwapChainId) {
        let mut state = self.lock();
        if state.swapchain(swapchain).is_some() {
            state.destroyed_swapchains.push(swapchain);
        }
    }

    fn input_devices(&self, _session: VRSessionHandle) -> Vec<VRInputState> {
        self.lock().input_devices.clone()
    }

    fn show_system_ui(&self, _session: VRSessionHandle, ui: VRSystemUI) -> Result<(), String> {
        self.lock().shown_ui.push(ui);
        Ok(())
    }
}
