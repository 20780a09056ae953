use lookaround_nfa::nfa::State;
use lookaround_nfa::{compile, CompiledPattern, Matcher};

fn main() {
    println!("Thompson NFA Lookaround Engine - Demo");
    println!("=====================================");

    // Patterns covering all four assertion forms plus combinations
    let cases = vec![
        (r"(?=abc)", &["abcdef", "xyz"][..]),
        (r"(?!abc)x", &["xyz", "x"][..]),
        (r"(?<=hello )world", &["hello world", "goodbye world"][..]),
        (r"(?<!\d)test", &["hello test", "123test"][..]),
        (r"test(?=\d)", &["test123", "test hello"][..]),
        (r"test(?!\d)", &["test hello", "test123"][..]),
        (r"(?<=\s)\d+(?=\s)", &[" 123 ", "123 "][..]),
        (r"(?<=ab?c)x", &["acx", "abcx", "abbcx"][..]),
        (r"(?<=a(?=b))b", &["ab", "cb"][..]),
        // Unbounded lookbehind width is rejected at compile time.
        (r"(?<=a+)b", &[][..]),
    ];

    for (pattern, inputs) in cases {
        println!("\n=== Pattern: '{}' ===", pattern);

        let compiled = match compile(pattern) {
            Ok(compiled) => compiled,
            Err(e) => {
                println!("Failed to compile: {}", e);
                continue;
            }
        };

        print_pattern(&compiled);

        let matcher = Matcher::new(&compiled);
        for input in inputs {
            match matcher.find(input) {
                Some(m) => println!(
                    "  '{}' => match at {}..{} ('{}')",
                    input,
                    m.start,
                    m.end,
                    &input[m.start..m.end]
                ),
                None => println!("  '{}' => no match", input),
            }
        }
    }
}

fn print_pattern(compiled: &CompiledPattern) {
    println!("Host automaton:");
    print_nfa(&compiled.host);
    for (id, fragment) in compiled.fragments.iter().enumerate() {
        println!(
            "Fragment {} ({:?} {:?}, width {}..{}):",
            id,
            fragment.polarity,
            fragment.direction,
            fragment.min_width,
            fragment
                .max_width
                .map_or_else(|| "unbounded".to_string(), |max| max.to_string()),
        );
        print_nfa(&fragment.nfa);
    }
}

fn print_nfa(nfa: &lookaround_nfa::Nfa) {
    println!("  start: {}, accepting: {:?}", nfa.start, nfa.accepting);
    for (id, state) in nfa.states.iter().enumerate() {
        print!("  {}: ", id);
        match state {
            State::Match => println!("MATCH"),
            State::Epsilon { next } => println!("ε -> {}", next),
            State::Split { targets } => println!("SPLIT -> {:?}", targets),
            State::Look { look, next } => println!("LOOK {:?} -> {}", look, next),
            State::Assert { fragment, next } => {
                println!("ASSERT fragment {} -> {}", fragment, next)
            }
            State::Ranges { transitions } => {
                println!("RANGES:");
                for transition in transitions {
                    if transition.start == transition.end {
                        println!("    {:?} -> {}", transition.start as char, transition.target);
                    } else {
                        println!(
                            "    {:?}-{:?} -> {}",
                            transition.start as char, transition.end as char, transition.target
                        );
                    }
                }
            }
        }
    }
}
