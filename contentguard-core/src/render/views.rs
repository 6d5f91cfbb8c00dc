//! Typed views over guarded content.
//!
//! Views only ever receive [`GuardedQuiz`] / [`GuardedQuestion`], whose display
//! fields are canonical by construction. Going through the guard is the only
//! way to get one, which keeps raw composites out of this layer entirely.
//! Substitute content carries a notice, rendered as `p.content-notice` so the
//! user sees a message instead of a blank card.

use super::node::{Child, NodeProps, OutputNode, Result};
use super::runtime::RenderRuntime;
use crate::interceptor::guard::{GuardedQuestion, GuardedQuiz};

pub trait ContentView<T: ?Sized> {
    fn render(&self, content: &T, runtime: &RenderRuntime) -> Result<OutputNode>;
}

impl<T: ?Sized, F> ContentView<T> for F
where
    F: Fn(&T, &RenderRuntime) -> Result<OutputNode>,
{
    fn render(&self, content: &T, runtime: &RenderRuntime) -> Result<OutputNode> {
        self(content, runtime)
    }
}

fn notice_node(notice: &str, rt: &RenderRuntime) -> Result<OutputNode> {
    rt.create_node("p", NodeProps::new().class("content-notice"), vec![Child::from(notice)])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionView;

impl ContentView<GuardedQuestion> for QuestionView {
    fn render(&self, q: &GuardedQuestion, rt: &RenderRuntime) -> Result<OutputNode> {
        if let Some(notice) = &q.notice {
            let body = notice_node(notice, rt)?;
            return rt.create_node(
                "div",
                NodeProps::new().key(q.key.clone()).class("question"),
                vec![Child::from(body)],
            );
        }

        let prompt = rt.create_node(
            "p",
            NodeProps::new().class("question-prompt"),
            vec![Child::from(q.prompt.clone())],
        )?;

        let answers = q
            .answers
            .iter()
            .enumerate()
            .map(|(i, answer)| {
                let mut props = NodeProps::new().key(i.to_string()).class("answer");
                if q.correct_answers.contains(&i) {
                    props = props.class("answer-correct");
                }
                rt.create_node("li", props, vec![Child::from(answer.as_str())])
                    .map(Child::from)
            })
            .collect::<Result<Vec<_>>>()?;
        let answers = rt.create_node("ul", NodeProps::new().class("question-answers"), answers)?;

        let mut children = vec![Child::from(prompt), Child::from(answers)];
        if !q.explanation.is_empty() {
            children.push(Child::from(rt.create_node(
                "p",
                NodeProps::new().class("question-explanation"),
                vec![Child::from(q.explanation.as_str())],
            )?));
        }

        rt.create_node(
            "div",
            NodeProps::new().key(q.key.clone()).class("question"),
            children,
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuizView;

impl ContentView<GuardedQuiz> for QuizView {
    fn render(&self, quiz: &GuardedQuiz, rt: &RenderRuntime) -> Result<OutputNode> {
        if let Some(notice) = &quiz.notice {
            let body = notice_node(notice, rt)?;
            return rt.create_node("section", NodeProps::new().class("quiz"), vec![Child::from(body)]);
        }

        let mut children = vec![Child::from(rt.create_node(
            "h2",
            NodeProps::new().class("quiz-title"),
            vec![Child::from(quiz.title.as_str())],
        )?)];

        if !quiz.description.is_empty() {
            children.push(Child::from(rt.create_node(
                "p",
                NodeProps::new().class("quiz-description"),
                vec![Child::from(quiz.description.as_str())],
            )?));
        }

        let questions = quiz
            .questions
            .iter()
            .map(|q| {
                let body = QuestionView.render(q, rt)?;
                rt.create_node("li", NodeProps::new().key(q.key.clone()), vec![Child::from(body)])
                    .map(Child::from)
            })
            .collect::<Result<Vec<_>>>()?;
        children.push(Child::from(rt.create_node(
            "ol",
            NodeProps::new().class("quiz-questions"),
            questions,
        )?));

        rt.create_node("section", NodeProps::new().class("quiz"), children)
    }
}
