//! The `link` subtest - full varying linking of a producer/consumer pair
//!
//! Each case holds the producer shader, optionally followed by the consumer.
//! Options on the `test link` line:
//! - `no-packing`, `no-lower-packed`, `no-lower-structs`, `default-fill`
//! - `max=N`, `base=N`, `clip=N` (lower `gl_ClipDistance[N]`)
//! - `separate` (separate transform feedback buffers)
//! - `capture=a,b,...` (transform feedback varyings)

use std::fmt::Write;

use lpc_glir::parse_shader;
use lpc_link::{
    link_varyings, BufferMode, ClipDistanceLowering, InfoLog, LinkOptions, LinkedVaryings,
    TransformFeedbackOptions, UnmatchedInputPolicy,
};

use crate::{filecheck::check_output, parser::parse_test_file};

/// Run tests from link test files
pub fn run_tests_from_file(content: &str) {
    let test_cases = parse_test_file(content);

    assert!(!test_cases.is_empty(), "No test cases found in test file");

    for case in &test_cases {
        assert!(
            case.command == "test link" || case.command.starts_with("test link "),
            "Unexpected test command: {}",
            case.command
        );
        let shaders = case.shaders();
        assert!(
            (1..=2).contains(&shaders.len()),
            "Expected a producer and an optional consumer, got {} shaders",
            shaders.len()
        );
        run_link_test(&case.args(), &shaders, &case.expected_text, &case.shader_text);
    }
}

struct Options {
    link: LinkOptions,
    tfeedback: TransformFeedbackOptions,
    captures: Vec<String>,
}

fn parse_options(args: &[&str]) -> Options {
    let mut options = Options {
        link: LinkOptions::default(),
        tfeedback: TransformFeedbackOptions::default(),
        captures: Vec::new(),
    };
    let number = |value: &str| -> u32 {
        value
            .parse()
            .unwrap_or_else(|_| panic!("Bad numeric option: {}", value))
    };
    for arg in args {
        match arg.split_once('=') {
            None => match *arg {
                "no-packing" => options.link.disable_varying_packing = true,
                "no-lower-packed" => options.link.lower_packed_varyings = false,
                "no-lower-structs" => options.link.lower_varying_structs = false,
                "default-fill" => options.link.unmatched_inputs = UnmatchedInputPolicy::DefaultFill,
                "separate" => options.tfeedback.buffer_mode = BufferMode::Separate,
                other => panic!("Unknown link option: {}", other),
            },
            Some(("max", value)) => options.link.max_varying_slots = number(value),
            Some(("base", value)) => options.link.generic_varying_base = number(value),
            Some(("clip", value)) => {
                options.link.clip_distance = ClipDistanceLowering::Lower {
                    array_size: number(value),
                }
            }
            Some(("capture", value)) => {
                options.captures = value.split(',').map(String::from).collect()
            }
            Some((key, _)) => panic!("Unknown link option: {}", key),
        }
    }
    options
}

/// Summary lines after the linked shaders.
fn describe(linked: &LinkedVaryings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "slots_used {}", linked.slots_used);
    let info = &linked.tfeedback;
    for output in &info.outputs {
        let _ = writeln!(
            out,
            "tfeedback output register={} component={} count={} buffer={} offset={}",
            output.output_register,
            output.component_offset,
            output.num_components,
            output.output_buffer,
            output.dst_offset
        );
    }
    for varying in &info.varyings {
        let _ = writeln!(
            out,
            "tfeedback varying {} {} {}",
            varying.name, varying.ty, varying.size
        );
    }
    for buffer in 0..info.num_buffers {
        let _ = writeln!(
            out,
            "tfeedback stride {} {}",
            buffer,
            info.buffer_stride(buffer)
        );
    }
    out
}

fn run_link_test(args: &[&str], shaders: &[String], expected_text: &str, input: &str) {
    let options = parse_options(args);
    let parse = |text: &str| {
        parse_shader(text)
            .unwrap_or_else(|e| panic!("Failed to parse shader: {}\n\nShader text:\n{}", e, text))
    };
    let mut producer = parse(&shaders[0]);
    let mut consumer = shaders.get(1).map(|text| parse(text));

    let mut log = InfoLog::new();
    let result = link_varyings(
        &mut producer,
        consumer.as_mut(),
        options.captures.as_slice(),
        &options.link,
        &options.tfeedback,
        &mut log,
    );

    let mut actual = String::new();
    match result {
        Ok(linked) => {
            actual += &producer.to_string();
            if let Some(consumer) = &consumer {
                actual += &consumer.to_string();
            }
            actual += &describe(&linked);
            actual += log.as_str();
        }
        Err(_) => actual += log.as_str(),
    }
    check_output(&actual, expected_text, input);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let options = parse_options(&["no-packing", "max=8", "clip=5", "capture=a,b[1]"]);
        assert!(options.link.disable_varying_packing);
        assert_eq!(options.link.max_varying_slots, 8);
        assert_eq!(
            options.link.clip_distance,
            ClipDistanceLowering::Lower { array_size: 5 }
        );
        assert_eq!(options.captures, ["a", "b[1]"]);
    }

    #[test]
    fn test_link_basic() {
        let content = include_str!("../filetests/link/basic.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_structs() {
        let content = include_str!("../filetests/link/structs.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_tfeedback() {
        let content = include_str!("../filetests/link/tfeedback.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_tfeedback_separate() {
        let content = include_str!("../filetests/link/tfeedback-separate.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_tfeedback_unpacked() {
        let content = include_str!("../filetests/link/tfeedback-unpacked.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_geometry() {
        let content = include_str!("../filetests/link/geometry.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_clip_distance() {
        let content = include_str!("../filetests/link/clip-distance.glir");
        run_tests_from_file(content);
    }

    #[test]
    fn test_link_errors() {
        let content = include_str!("../filetests/link/errors.glir");
        run_tests_from_file(content);
    }
}
