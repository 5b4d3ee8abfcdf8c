#![cfg(feature = "mock")]

extern crate rust_vrframe;

use rust_vrframe::api::{MockCompositor, MockGpu, MockGpuContextFactory, MockGpuState, MockPlatform};
use rust_vrframe::utils;
use rust_vrframe::{VRButtons, VRControllerType, VRError, VREvent, VRFrameFlags, VRGpuCapabilities, VRInputState, VRLayer,
                   VRLayerFlags, VRPerfThreadType, VRPipelineSettings, VRSession, VRSurface, VRSystemUI,
                   VRThreadingMode};
use std::sync::Arc;

fn settings(threading: VRThreadingMode) -> VRPipelineSettings {
    VRPipelineSettings {
        num_instances: 64,
        ..VRPipelineSettings::default()
    }.with_threading(threading)
}

fn with_swap_interval(settings: VRPipelineSettings, swap_interval: u32) -> VRPipelineSettings {
    VRPipelineSettings {
        swap_interval: swap_interval,
        ..settings
    }
}

fn back_button(down: bool) -> Vec<VRInputState> {
    let buttons = if down { VRButtons::BACK } else { VRButtons::empty() };
    vec![VRInputState::new(1, VRControllerType::TrackedRemote, buttons)]
}

#[test]
fn single_threaded_session_from_loading_frame_to_final() {
    let compositor = Arc::new(MockCompositor::new());
    let gpu = MockGpu::new(VRGpuCapabilities::default());
    let gpu_state = gpu.state_handle();
    let settings = with_swap_interval(settings(VRThreadingMode::SingleThreaded), 2);
    let mut session = VRSession::new(compositor.clone(), Box::new(MockPlatform::running(3)), Box::new(gpu), None,
                                     settings).unwrap();
    session.run().unwrap();

    let state = compositor.state_handle();
    let state = state.lock().unwrap();
    assert!(state.rejected_submissions.is_empty(), "{:?}", state.rejected_submissions);

    // Loading frame, three rendered frames, black final frame.
    let submissions = &state.submissions;
    assert_eq!(submissions.len(), 5);

    let loading = &submissions[0].desc;
    assert_eq!(loading.flags, VRFrameFlags::FLUSH);
    assert_eq!(loading.swap_interval, 1);
    assert_eq!(loading.layers.len(), 2);
    assert!(loading.layers.iter().all(|l| l.flags().contains(VRLayerFlags::INHIBIT_SRGB_FRAMEBUFFER)));

    for pair in submissions[1..4].windows(2) {
        assert_eq!(pair[1].desc.frame_index, pair[0].desc.frame_index + 1);
    }
    for frame in &submissions[1..4] {
        assert!(frame.desc.flags.is_empty());
        assert_eq!(frame.desc.swap_interval, 2);
        assert_eq!(frame.desc.layers.len(), 1);
        match frame.desc.layers[0] {
            VRLayer::Projection(ref layer) => {
                assert!(layer.header.flags.contains(VRLayerFlags::CHROMATIC_ABERRATION_CORRECTION));
            },
            ref layer => panic!("unexpected layer {:?}", layer.layer_type()),
        }
        assert!(frame.desc.completion_fence != 0);
    }

    let last = &submissions[4].desc;
    assert!(last.is_final());
    assert!(last.flags.contains(VRFrameFlags::FLUSH));
    assert_eq!(last.swap_interval, 1);
    assert_eq!(last.frame_index, submissions[3].desc.frame_index);
    assert_eq!(state.final_submissions(), 1);

    // Single threaded: both perf registrations name the calling thread.
    let main_tid = utils::current_thread_id();
    assert_eq!(state.perf_threads, vec![(VRPerfThreadType::Main, main_tid), (VRPerfThreadType::Renderer, main_tid)]);
    assert!(submissions.iter().all(|s| s.thread_id == main_tid));

    assert_eq!(state.left_sessions.len(), 1);
    assert!(state.shut_down);
    assert_eq!(state.live_swapchains(), 0);

    let gpu_state = gpu_state.lock().unwrap();
    assert_eq!(gpu_state.live_render_targets(), 0);
    assert_eq!(gpu_state.live_programs(), 0);
    assert_eq!(gpu_state.live_buffers(), 0);
    assert_eq!(gpu_state.live_vertex_arrays(), 0);
    assert_eq!(gpu_state.live_fences(), 0);
}

#[test]
fn dual_threaded_shutdown_sends_exactly_one_final_frame() {
    let compositor = Arc::new(MockCompositor::new());
    let gpu_state = MockGpuState::new_shared(VRGpuCapabilities::default());
    let gpu = MockGpu::with_state(gpu_state.clone());
    let factory = MockGpuContextFactory::new(gpu_state.clone());
    let settings = with_swap_interval(settings(VRThreadingMode::DualThreaded), 2);
    let mut session = VRSession::new(compositor.clone(), Box::new(MockPlatform::running(4)), Box::new(gpu),
                                     Some(Box::new(factory)), settings).unwrap();

    let render_tid = session.perf_registration().renderer_tid;
    let main_tid = utils::current_thread_id();
    assert!(render_tid != 0 && render_tid != main_tid);

    session.run().unwrap();
    {
        let state = compositor.state_handle();
        let state = state.lock().unwrap();
        assert!(state.rejected_submissions.is_empty(), "{:?}", state.rejected_submissions);
        assert_eq!(state.final_submissions(), 1);

        let last = state.submissions.last().unwrap();
        assert!(last.desc.flags.contains(VRFrameFlags::FLUSH | VRFrameFlags::FINAL));
        // Through the render thread the bootstrap frames keep the configured interval.
        assert_eq!(state.submissions[0].desc.flags, VRFrameFlags::FLUSH);
        assert!(state.submissions.iter().all(|s| s.desc.swap_interval == 2));
        assert!(state.submissions.iter().all(|s| s.thread_id == render_tid));
        assert!(state.perf_threads.contains(&(VRPerfThreadType::Renderer, render_tid)));
        // One frame in flight at most.
        assert_eq!(state.max_concurrent_submits, 1);
    }

    // The render thread tore its context down when it was joined.
    assert_eq!(gpu_state.lock().unwrap().created_contexts.len(), 2);
    assert_eq!(gpu_state.lock().unwrap().destroyed_contexts.len(), 1);

    // Nothing goes out after shutdown, not even on a second one.
    let submitted = compositor.state_handle().lock().unwrap().submissions.len();
    session.shutdown().unwrap();
    assert!(!session.run_cycle().unwrap());
    drop(session);
    assert_eq!(compositor.state_handle().lock().unwrap().submissions.len(), submitted);
    assert_eq!(gpu_state.lock().unwrap().destroyed_contexts.len(), 2);
    assert_eq!(gpu_state.lock().unwrap().live_buffers(), 0);
}

#[test]
fn back_button_release_finishes_the_session() {
    let compositor = Arc::new(MockCompositor::new());
    let gpu = Box::new(MockGpu::new(VRGpuCapabilities::default()));
    let mut session = VRSession::new(compositor.clone(), Box::new(MockPlatform::running(6)), gpu, None,
                                     settings(VRThreadingMode::SingleThreaded)).unwrap();
    let state = compositor.state_handle();

    assert!(session.run_cycle().unwrap());
    state.lock().unwrap().input_devices = back_button(true);
    assert!(session.run_cycle().unwrap());
    assert!(!session.is_finalized());

    state.lock().unwrap().input_devices = back_button(false);
    assert!(session.run_cycle().unwrap());
    assert!(session.is_finalized());
    {
        let state = state.lock().unwrap();
        assert_eq!(state.shown_ui, vec![VRSystemUI::ConfirmQuit]);
        assert!(state.submissions.last().unwrap().desc.is_final());
    }

    // Still in VR mode, but nothing more is produced.
    let submitted = state.lock().unwrap().submissions.len();
    assert!(session.run_cycle().unwrap());
    assert!(session.is_active());
    session.run().unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.submissions.len(), submitted);
    assert_eq!(state.final_submissions(), 1);
    assert!(state.rejected_submissions.is_empty());
}

#[test]
fn refused_mode_entry_renders_nothing() {
    let compositor = Arc::new(MockCompositor::new());
    compositor.state_handle().lock().unwrap().reject_vr_mode = true;
    let platform = MockPlatform::new(vec![
        vec![VREvent::Resumed, VREvent::SurfaceCreated(VRSurface(7))],
        vec![],
        vec![],
    ]);
    let gpu = Box::new(MockGpu::new(VRGpuCapabilities::default()));
    let mut session = VRSession::new(compositor.clone(), Box::new(platform), gpu, None,
                                     settings(VRThreadingMode::SingleThreaded)).unwrap();
    session.run().unwrap();

    let state = compositor.state_handle();
    let state = state.lock().unwrap();
    // The refused surface is not retried.
    assert_eq!(state.mode_parms.len(), 1);
    assert_eq!(state.mode_parms[0].window_surface, 7);
    assert!(state.submissions.is_empty());
    assert!(state.left_sessions.is_empty());
    assert!(state.shut_down);
}

#[test]
fn scene_without_rotations_fails_setup() {
    let compositor = Arc::new(MockCompositor::new());
    let gpu = Box::new(MockGpu::new(VRGpuCapabilities::default()));
    let settings = VRPipelineSettings {
        num_rotations: 0,
        ..settings(VRThreadingMode::SingleThreaded)
    };
    let mut session = VRSession::new(compositor.clone(), Box::new(MockPlatform::running(3)), gpu, None,
                                     settings).unwrap();
    match session.run() {
        Err(e @ VRError::InvalidSettings(_)) => assert!(e.is_fatal()),
        other => panic!("unexpected run result: {:?}", other),
    }

    let state = compositor.state_handle();
    let state = state.lock().unwrap();
    // Only the loading frame went out before the scene failed.
    assert_eq!(state.submissions.len(), 2);
    assert_eq!(state.submissions[0].desc.flags, VRFrameFlags::FLUSH);
    assert!(state.submissions[1].desc.is_final());
    assert!(state.shut_down);
}

#[test]
fn render_thread_panic_ends_the_session_with_an_error() {
    let compositor = Arc::new(MockCompositor::new());
    let gpu_state = MockGpuState::new_shared(VRGpuCapabilities::default());
    gpu_state.lock().unwrap().panic_on_draw = true;
    let gpu = MockGpu::with_state(gpu_state.clone());
    let factory = MockGpuContextFactory::new(gpu_state.clone());
    let mut session = VRSession::new(compositor.clone(), Box::new(MockPlatform::running(4)), Box::new(gpu),
                                     Some(Box::new(factory)), settings(VRThreadingMode::DualThreaded)).unwrap();

    match session.run() {
        Err(VRError::RenderThread(_)) => {},
        other => panic!("unexpected run result: {:?}", other),
    }

    let state = compositor.state_handle();
    let state = state.lock().unwrap();
    // The loading frame made it, the first rendered frame did not.
    assert_eq!(state.submissions.len(), 1);
    assert_eq!(state.submissions[0].desc.flags, VRFrameFlags::FLUSH);
    assert_eq!(state.left_sessions.len(), 1);
    assert!(state.shut_down);
}
