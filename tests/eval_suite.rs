// Copyright (C) 2026 the etamoo authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! End-to-end suite: programs are compiled and executed through the full
//! scheduler/VM/database stack, and results observed as a player would see
//! them.

mod common;

use std::time::Instant;

use common::{none_none_none, TestWorld, ROOM, WIZARD};
use etamoo::config::Config;

#[test]
fn test_eval_arithmetic() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("1 + 2"), "=> 3");
    assert_eq!(world.eval_result("7 % 3"), "=> 1");
    assert_eq!(world.eval_result("2.5 * 2.0"), "=> 5.0");
    assert_eq!(world.eval_result("2 ^ 10"), "=> 1024");
    assert_eq!(world.eval_result("- (3 - 5)"), "=> 2");
}

#[test]
fn test_eval_string_concat() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(r#""Hello, " + "world""#),
        r#"=> "Hello, world""#
    );
}

#[test]
fn test_eval_list_slice() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("{1, 2, 3, 4}[2..3]"), "=> {2, 3}");
    assert_eq!(world.eval_result("{1, 2, 3}[2]"), "=> 2");
    assert_eq!(world.eval_result(r#""frobozz"[2..4]"#), r#"=> "rob""#);
}

#[test]
fn test_eval_dollar_length() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("{1, 2, 3}[$]"), "=> 3");
    assert_eq!(world.eval_result(r#""abcd"[$ - 1]"#), r#"=> "c""#);
}

#[test]
fn test_eval_comparison_and_logic() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("1 < 2 && 2 <= 2"), "=> 1");
    assert_eq!(world.eval_result("1 > 2 || 0"), "=> 0");
    assert_eq!(world.eval_result("!0"), "=> 1");
    assert_eq!(world.eval_result(r#""abc" == "ABC""#), "=> 1");
    assert_eq!(world.eval_result("3 in {1, 2, 3}"), "=> 3");
}

#[test]
fn test_eval_conditional_expr() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("1 ? 2 | 3"), "=> 2");
    assert_eq!(world.eval_result("0 ? 2 | 3"), "=> 3");
}

#[test]
fn test_eval_statements() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result("x = 0; for i in [1..10] x = x + i; endfor return x;"),
        "=> 55"
    );
    assert_eq!(
        world.eval_result("x = 0; while (x < 5) x = x + 1; endwhile return x;"),
        "=> 5"
    );
    assert_eq!(
        world.eval_result("r = {}; for v in ({3, 2, 1}) r = {@r, v + 1}; endfor return r;"),
        "=> {4, 3, 2}"
    );
    assert_eq!(
        world.eval_result(
            "x = 0; while outer (1) x = x + 1; if (x > 3) break outer; endif endwhile return x;"
        ),
        "=> 4"
    );
}

#[test]
fn test_eval_scatter() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(r#"{a, ?b = 10, @rest} = {1}; return {a, b, rest};"#),
        "=> {1, 10, {}}"
    );
    assert_eq!(
        world.eval_result(r#"{a, ?b = 10, @rest} = {1, 2, 3, 4}; return {a, b, rest};"#),
        "=> {1, 2, {3, 4}}"
    );
}

#[test]
fn test_division_by_zero_with_debug_on_produces_traceback() {
    let mut world = TestWorld::new();
    // eval runs with the debug bit on, so the error becomes a traceback.
    let output = world.eval("1/0");
    assert!(
        output.iter().any(|line| line.contains("Division by zero")),
        "no traceback in {:?}",
        output
    );
    assert!(
        output.iter().any(|line| line.contains("End of traceback")),
        "no traceback trailer in {:?}",
        output
    );
}

#[test]
fn test_division_by_zero_with_debug_off_yields_error_value() {
    let mut world = TestWorld::new();
    // A non-d verb swallows the raise; the error is just a value.
    world.add_verb_no_debug(ROOM, &["divzero"], "return 1/0;");
    assert_eq!(world.eval_result("#2:divzero()"), "=> E_DIV");
}

#[test]
fn test_catch_expression() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(r#"`1/0 ! E_DIV => "nope"'"#),
        r#"=> "nope""#
    );
    assert_eq!(world.eval_result(r#"`1/0 ! ANY => "any"'"#), r#"=> "any""#);
    assert_eq!(world.eval_result(r#"`1 + 1 ! E_DIV => "nope"'"#), "=> 2");
    // Without a default, the caught code itself is the value.
    assert_eq!(world.eval_result("`1/0 ! E_DIV'"), "=> E_DIV");
    // A non-matching code propagates.
    let output = world.eval(r#"`1/0 ! E_TYPE => "nope"'"#);
    assert!(output.iter().any(|line| line.contains("Division by zero")));
}

#[test]
fn test_try_except_and_finally() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(
            r#"try return 1/0; except e (E_DIV) return {"caught", e[1]}; endtry"#
        ),
        r#"=> {"caught", E_DIV}"#
    );
    assert_eq!(
        world.eval_result(
            "x = 0; try x = 1; finally x = x + 10; endtry return x;"
        ),
        "=> 11"
    );
    // The finally body runs even when the try body raises.
    let output = world.eval(
        r#"try 1/0; finally notify(player, "cleanup ran"); endtry"#,
    );
    assert!(
        output.iter().any(|line| line.contains("cleanup ran")),
        "finally skipped: {:?}",
        output
    );
    assert!(output.iter().any(|line| line.contains("Division by zero")));
}

#[test]
fn test_try_finally_on_break() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(
            "x = 0; while (1) try break; finally x = 99; endtry endwhile return x;"
        ),
        "=> 99"
    );
}

#[test]
fn test_verb_call_and_pass() {
    let mut world = TestWorld::new();
    world.add_verb(ROOM, &["describe"], common::this_none_this(), r#"return "plain";"#);
    assert_eq!(world.eval_result("#2:describe()"), r#"=> "plain""#);

    // A child overrides and passes through to the parent's version; `this`
    // stays the child all the way up.
    assert_eq!(world.eval_result("return create(#2);"), "=> #3");
    world.add_verb(ROOM, &["greet"], common::this_none_this(), r#"return {"base", this};"#);
    world.add_verb(
        etamoo::var::Objid(3),
        &["greet"],
        common::this_none_this(),
        r#"return {"kid", pass()};"#,
    );
    assert_eq!(
        world.eval_result("#3:greet()"),
        r#"=> {"kid", {"base", #3}}"#
    );
}

#[test]
fn test_builtin_functions_through_eval() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("typeof(1.0)"), "=> 9");
    assert_eq!(world.eval_result("tostr(1, \" + \", 2)"), r#"=> "1 + 2""#);
    assert_eq!(world.eval_result("toliteral({1, \"x\"})"), r#"=> "{1, \"x\"}""#);
    assert_eq!(world.eval_result("toint(\"42abc\")"), "=> 42");
    assert_eq!(world.eval_result("setadd({1, 2}, 2)"), "=> {1, 2}");
    assert_eq!(world.eval_result("listinsert({2, 3}, 1, 1)"), "=> {1, 2, 3}");
    assert_eq!(world.eval_result("strsub(\"frob the frob\", \"frob\", \"x\")"), r#"=> "x the x""#);
    assert_eq!(world.eval_result("index(\"foobar\", \"O\")"), "=> 2");
    assert_eq!(
        world.eval_result("value_hash(1) == string_hash(toliteral(1))"),
        "=> 1"
    );
    assert_eq!(world.eval_result("length({1, 2, 3})"), "=> 3");
    assert_eq!(world.eval_result("max(1, 7, 3)"), "=> 7");
    assert_eq!(world.eval_result("abs(-5)"), "=> 5");
}

#[test]
fn test_property_round_trip() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(
            r#"add_property(#2, "mood", "gloomy", {player, "rc"}); return #2.mood;"#
        ),
        r#"=> "gloomy""#
    );
    assert_eq!(
        world.eval_result(r#"#2.mood = "sunny"; return #2.mood;"#),
        r#"=> "sunny""#
    );
    // Inheritance: children see the parent's value until they override.
    assert_eq!(
        world.eval_result(
            r#"kid = create(#2); v = kid.mood; kid.mood = "dim"; return {v, kid.mood, #2.mood, is_clear_property(kid, "mood")};"#
        ),
        r#"=> {"sunny", "dim", "sunny", 0}"#
    );
}

#[test]
fn test_object_lifecycle() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(
            "o = create(#2); return {valid(o), parent(o), o in children(#2)};"
        ),
        "=> {1, #2, 1}"
    );
    assert_eq!(
        world.eval_result("o = create(#2); recycle(o); return valid(o);"),
        "=> 0"
    );
    assert_eq!(world.eval_result("max_object() >= #2"), "=> 1");
}

#[test]
fn test_chparent_cycle_refused() {
    let mut world = TestWorld::new();
    // Build #5 and #6 with #6 a descendant of #5, then try to close the
    // loop; the parent must be unchanged afterward.
    assert_eq!(
        world.eval_result(
            r#"
            a = create(#2);
            b = create(a);
            r = `chparent(a, b) ! E_RECMOVE => "refused"';
            return {r, parent(a)};
            "#
        ),
        r#"=> {"refused", #2}"#
    );
    assert_eq!(
        world.eval_result("o = create(#2); return `chparent(o, o) ! E_RECMOVE => 1';"),
        "=> 1"
    );
}

#[test]
fn test_move_and_contents() {
    let mut world = TestWorld::new();
    // No accept verb on the destination refuses non-wizards, but the
    // wizard pushes through.
    assert_eq!(
        world.eval_result(
            "box = create(#2); thing = create(#2); move(thing, box); \
             return {thing.location == box, thing in box.contents};"
        ),
        "=> {1, 1}"
    );
    // Recursive containment is refused.
    assert_eq!(
        world.eval_result(
            "a = create(#2); b = create(#2); move(b, a); \
             return `move(a, b) ! E_RECMOVE => \"refused\"';"
        ),
        r#"=> "refused""#
    );
}

#[test]
fn test_move_accept_protocol() {
    let mut world = TestWorld::new();
    world.add_verb(
        ROOM,
        &["accept"],
        common::this_none_this(),
        "return this.accepting;",
    );
    // The accept verb is consulted and an accepting destination takes the
    // object in.
    assert_eq!(
        world.eval_result(
            r#"
            add_property(#2, "accepting", 0, {player, "rc"});
            box = create(#2);
            thing = create(#2);
            box.accepting = 1;
            move(thing, box);
            return thing.location == box;
            "#,
        ),
        "=> 1"
    );
}

#[test]
fn test_fork_ordering() {
    let mut world = TestWorld::new();
    let start = Instant::now();
    let output = world.eval(
        r#"fork (1) notify(player, "late"); endfork notify(player, "early"); return 0;"#,
    );
    let elapsed = start.elapsed();

    let early = output.iter().position(|l| l == "early");
    let late = output.iter().position(|l| l == "late");
    assert!(early.is_some(), "missing 'early' in {:?}", output);
    assert!(late.is_some(), "missing 'late' in {:?}", output);
    assert!(early < late, "fork ran before the parent finished: {:?}", output);
    // The forked body must not start before its delay.
    assert!(
        elapsed.as_millis() >= 900,
        "fork delay not respected: {:?}",
        elapsed
    );
}

#[test]
fn test_fork_label_binds_task_id() {
    let mut world = TestWorld::new();
    let result = world.eval_result(
        "fork tid (0) endfork return tid > 0;",
    );
    assert_eq!(result, "=> 1");
}

#[test]
fn test_suspend_resumes_with_fresh_budget() {
    let mut world = TestWorld::new();
    let start = Instant::now();
    assert_eq!(world.eval_result("suspend(1); return 7;"), "=> 7");
    assert!(
        start.elapsed().as_millis() >= 900,
        "suspend returned too early"
    );
}

#[test]
fn test_tick_budget_exhaustion_aborts() {
    let mut world = TestWorld::with_config(Config {
        fg_ticks: 10_000,
        ..Config::default()
    });
    let output = world.eval("while (1) endwhile");
    assert!(
        output.iter().any(|l| l.contains("out of ticks")),
        "no abort message in {:?}",
        output
    );
}

#[test]
fn test_ticks_left_decreases() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result("a = ticks_left(); b = ticks_left(); return a > b;"),
        "=> 1"
    );
}

#[test]
fn test_command_dispatch() {
    let mut world = TestWorld::new();
    world.add_verb(
        ROOM,
        &["look"],
        none_none_none(),
        r#"notify(player, "You see a plain room.");"#,
    );
    let output = world.command("look");
    assert!(
        output.iter().any(|l| l.contains("plain room")),
        "look did not dispatch: {:?}",
        output
    );

    // An unmatched command produces the stock complaint.
    let output = world.command("frobnicate the bizbaz");
    assert!(
        output.iter().any(|l| l.contains("couldn't understand")),
        "no huh response: {:?}",
        output
    );
}

#[test]
fn test_command_dispatch_with_objects() {
    let mut world = TestWorld::new();
    world.add_verb(
        ROOM,
        &["poke"],
        etamoo::model::r#match::VerbArgsSpec {
            dobj: etamoo::model::r#match::ArgSpec::Any,
            prep: etamoo::model::r#match::PrepSpec::None,
            iobj: etamoo::model::r#match::ArgSpec::None,
        },
        r#"notify(player, tostr("you poke ", dobjstr));"#,
    );
    let output = world.command("poke wizard");
    assert!(
        output.iter().any(|l| l.contains("you poke wizard")),
        "poke did not dispatch: {:?}",
        output
    );
}

#[test]
fn test_eval_shorthand_command() {
    let mut world = TestWorld::new();
    let session = std::sync::Arc::new(etamoo::tasks::sessions::BufferingSession::new());
    world
        .scheduler
        .submit_command_task(WIZARD, ";3 * 4", session.clone());
    world.scheduler.run_until_quiescent();
    let output: Vec<String> = session.drain().into_iter().map(|(_, l)| l).collect();
    assert!(output.iter().any(|l| l == "=> 12"), "bad output {:?}", output);
}

#[test]
fn test_queued_tasks_and_kill_task() {
    let mut world = TestWorld::new();
    // A task suspended far in the future shows up in queued_tasks() and can
    // be killed by id.
    let result = world.eval_result(
        r#"
        fork tid (120) notify(player, "never"); endfork
        queued = queued_tasks();
        found = 0;
        for entry in (queued)
            if (entry[1] == tid)
                found = 1;
            endif
        endfor
        killed = kill_task(tid);
        return {found, killed, length(queued_tasks())};
        "#,
    );
    assert_eq!(result, "=> {1, 0, 0}");
}

#[test]
fn test_errors_as_values() {
    let mut world = TestWorld::new();
    assert_eq!(world.eval_result("E_PERM"), "=> E_PERM");
    assert_eq!(world.eval_result("tostr(E_PERM)"), r#"=> "Permission denied""#);
    assert_eq!(world.eval_result("typeof(E_PERM)"), "=> 3");
    assert_eq!(world.eval_result("E_TYPE < E_RANGE"), "=> 1");
}

#[test]
fn test_raise_builtin() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result(r#"`raise(E_PERM, "custom") ! E_PERM => "got it"'"#),
        r#"=> "got it""#
    );
    // The message and value travel with the exception.
    assert_eq!(
        world.eval_result(
            r#"try raise(E_PERM, "custom", 42); except e (ANY) return {e[1], e[2], e[3]}; endtry"#
        ),
        r#"=> {E_PERM, "custom", 42}"#
    );
}

#[test]
fn test_objects_in_for_range() {
    let mut world = TestWorld::new();
    assert_eq!(
        world.eval_result("r = {}; for o in [#0..#2] r = {@r, o}; endfor return r;"),
        "=> {#0, #1, #2}"
    );
}

#[test]
fn test_recursion_limit() {
    let mut world = TestWorld::new();
    world.add_verb(ROOM, &["recur"], common::this_none_this(), "return this:recur();");
    let output = world.eval("#2:recur()");
    assert!(
        output
            .iter()
            .any(|l| l.contains("Too many verb calls") || l.contains("E_MAXREC")),
        "no recursion abort in {:?}",
        output
    );
}
